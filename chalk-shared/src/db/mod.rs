/// Database layer
///
/// # Modules
///
/// - `pool`: PostgreSQL connection pool
/// - `migrations`: embedded schema migrations
/// - `ordering`: dense per-parent ordering shared by modules, lessons and blocks
///
/// Entity stores live in [`crate::models`].

pub mod migrations;
pub mod ordering;
pub mod pool;
