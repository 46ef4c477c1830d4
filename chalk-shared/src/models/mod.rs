/// Database models and their operations
///
/// Each model is a plain struct with associated async functions taking a
/// `&PgPool`, in the style `Course::create(&pool, account_id, "Rust")`.
///
/// # Models
///
/// - `user`: registered users
/// - `account`: accounts and their members
/// - `session`: access/refresh token sessions
/// - `file`: uploaded file metadata
/// - `course`: courses and the course outline
/// - `module`, `lesson`, `block`: the ordered course content
/// - `enrollment`: course participants

pub mod account;
pub mod block;
pub mod course;
pub mod enrollment;
pub mod file;
pub mod lesson;
pub mod module;
pub mod session;
pub mod user;
