mod database;
mod news_repo;
mod status_repo;
mod task_repo;

pub use database::Database;
pub use news_repo::{NewsRepository, PostingStats};
pub use status_repo::StatusRepository;
pub use task_repo::TaskRepository;
