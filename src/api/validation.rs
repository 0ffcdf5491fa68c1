use super::ApiError;

pub fn validate_path_name<'a>(value: &'a str, what: &str) -> Result<&'a str, ApiError> {
    if value.trim().is_empty() {
        return Err(ApiError::validation(format!("{what} cannot be empty")));
    }

    if value.len() > 255 {
        return Err(ApiError::validation(format!(
            "{what} must be 255 characters or less"
        )));
    }

    if value.chars().any(char::is_control) {
        return Err(ApiError::validation(format!(
            "{what} contains control characters"
        )));
    }

    Ok(value)
}

pub fn validate_component(component: &str) -> Result<&str, ApiError> {
    let component = validate_path_name(component, "Component")?;

    if !component
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-' || c == '_' || c == '.')
    {
        return Err(ApiError::validation(
            "Component name can only contain letters, numbers, dots, hyphens, and underscores",
        ));
    }

    Ok(component)
}

pub fn validate_template_id(id: i64) -> Result<i64, ApiError> {
    if id <= 0 {
        return Err(ApiError::validation(format!(
            "Invalid template ID: {id}. ID must be a positive integer"
        )));
    }
    Ok(id)
}
