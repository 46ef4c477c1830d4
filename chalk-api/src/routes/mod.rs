/// API route handlers
///
/// This module contains all route handlers organized by resource:
///
/// - `health`: Health check endpoint
/// - `auth`: Verification codes, sign-up, sign-in, refresh and sign-out
/// - `accounts`: Accounts and their members
/// - `courses`: Courses, outlines and participants
/// - `content`: Modules, lessons and blocks, including reordering
/// - `files`: File upload and download

pub mod accounts;
pub mod auth;
pub mod content;
pub mod courses;
pub mod files;
pub mod health;
