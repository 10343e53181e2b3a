//! Input checks shared by every entry point. Each returns the trimmed value.

use crate::error::{AppError, Result};

pub const TITLE_MIN: usize = 5;
pub const TITLE_MAX: usize = 255;
pub const CONTENT_MIN: usize = 5;
pub const CONTENT_MAX: usize = 10_000;
pub const FORUM_NAME_MAX: usize = 50;
pub const SLUG_MAX: usize = 50;

fn length_between(field: &str, value: &str, min: usize, max: usize) -> Result<String> {
    let trimmed = value.trim();
    let len = trimmed.chars().count();
    if len < min {
        return Err(AppError::ValidationError(format!(
            "{field} must be at least {min} characters"
        )));
    }
    if len > max {
        return Err(AppError::ValidationError(format!(
            "{field} must be at most {max} characters"
        )));
    }
    Ok(trimmed.to_string())
}

pub fn thread_title(title: &str) -> Result<String> {
    length_between("title", title, TITLE_MIN, TITLE_MAX)
}

pub fn post_content(content: &str) -> Result<String> {
    length_between("content", content, CONTENT_MIN, CONTENT_MAX)
}

pub fn forum_name(name: &str) -> Result<String> {
    length_between("name", name, 1, FORUM_NAME_MAX)
}

pub fn forum_slug(slug: &str) -> Result<String> {
    let slug = length_between("slug", slug, 1, SLUG_MAX)?;
    if !slug
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
    {
        return Err(AppError::ValidationError(
            "slug may only contain a-z, 0-9 and '-'".to_string(),
        ));
    }
    Ok(slug)
}

pub fn email(address: &str) -> Result<String> {
    let address = address.trim();
    match address.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() && !domain.contains('@') => {
            Ok(address.to_string())
        }
        _ => Err(AppError::ValidationError(format!(
            "`{address}` is not an email address"
        ))),
    }
}
