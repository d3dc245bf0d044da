pub mod cart;
pub mod checkout;
pub mod event_filter;
pub mod history;
pub mod ratings;
pub mod seeder;
