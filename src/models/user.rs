use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    Admin,
    Organizer,
    Attendee,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::Admin, Role::Organizer, Role::Attendee];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "Admin",
            Role::Organizer => "Organizer",
            Role::Attendee => "Attendee",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::ALL
            .into_iter()
            .find(|r| r.as_str().eq_ignore_ascii_case(s))
            .ok_or(())
    }
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub full_name: Option<String>,
    pub phone_number: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub profile_picture_url: Option<String>,
    pub email_confirmed: bool,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl User {
    // Найти пользователя по email
    pub async fn find_by_email(email: &str, db: &crate::database::Database) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE LOWER(email) = LOWER($1)")
            .bind(email)
            .fetch_optional(&db.pool)
            .await
    }

    pub async fn find(id: Uuid, db: &crate::database::Database) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&db.pool)
            .await
    }

    pub async fn roles(id: Uuid, db: &crate::database::Database) -> Result<Vec<Role>, sqlx::Error> {
        let names: Vec<String> =
            sqlx::query_scalar("SELECT role FROM user_roles WHERE user_id = $1 ORDER BY role")
                .bind(id)
                .fetch_all(&db.pool)
                .await?;
        Ok(names.iter().filter_map(|n| n.parse().ok()).collect())
    }

    pub async fn add_role(id: Uuid, role: Role, db: &crate::database::Database) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "INSERT INTO user_roles (user_id, role) VALUES ($1, $2) ON CONFLICT DO NOTHING",
        )
        .bind(id)
        .bind(role.as_str())
        .execute(&db.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub fn verify_password(&self, password: &str) -> bool {
        bcrypt::verify(password, &self.password_hash).unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roles_round_trip_through_names() {
        for role in Role::ALL {
            assert_eq!(role.as_str().parse::<Role>(), Ok(role));
        }
        assert_eq!("organizer".parse::<Role>(), Ok(Role::Organizer));
        assert!("Owner".parse::<Role>().is_err());
    }

    #[test]
    fn password_checked_against_bcrypt_hash() {
        let user = User {
            id: Uuid::new_v4(),
            email: "a@b.c".to_string(),
            password_hash: bcrypt::hash("secret1", 4).unwrap(),
            full_name: None,
            phone_number: None,
            date_of_birth: None,
            profile_picture_url: None,
            email_confirmed: true,
            is_active: true,
            created_at: Utc::now(),
        };
        assert!(user.verify_password("secret1"));
        assert!(!user.verify_password("secret2"));
    }
}
