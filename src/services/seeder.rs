use crate::config::SeedAdminConfig;
use crate::database::Database;
use crate::error::AppError;
use crate::models::{Role, User};
use tracing::info;

/// Создает администратора при старте и выдает ему все роли.
pub async fn seed_admin(db: &Database, admin: &SeedAdminConfig) -> Result<(), AppError> {
    let user = match User::find_by_email(&admin.email, db).await? {
        Some(user) => user,
        None => {
            let password = admin.password.clone();
            let hash = tokio::task::spawn_blocking(move || bcrypt::hash(password, bcrypt::DEFAULT_COST))
                .await
                .map_err(|e| AppError::Internal(format!("hashing task failed: {}", e)))?
                .map_err(|e| AppError::Internal(format!("bcrypt: {}", e)))?;

            let user = sqlx::query_as::<_, User>(
                "INSERT INTO users (email, password_hash, full_name, email_confirmed)
                 VALUES ($1, $2, $3, TRUE)
                 RETURNING *",
            )
            .bind(&admin.email)
            .bind(hash)
            .bind(&admin.full_name)
            .fetch_one(&db.pool)
            .await?;
            info!("Seeded admin account {}", user.email);
            user
        }
    };

    for role in Role::ALL {
        if User::add_role(user.id, role, db).await? {
            info!("Granted {} role to {}", role, user.email);
        }
    }
    Ok(())
}
