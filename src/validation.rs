use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("No file part in the request")]
    MissingFile,

    #[error("No file selected")]
    EmptyFilename,

    #[error("File type not allowed")]
    DisallowedType,
}

/// True when `filename` has a non-empty extension in `allowed`, ignoring case.
pub fn allowed_file<S: AsRef<str>>(filename: &str, allowed: &[S]) -> bool {
    match filename.rsplit_once('.') {
        Some((_, extension)) if !extension.is_empty() => {
            let extension = extension.to_lowercase();
            allowed.iter().any(|ext| ext.as_ref() == extension)
        }
        _ => false,
    }
}

/// Reduces a client-supplied filename to its final path component.
///
/// Browsers and scripted clients sometimes send the full local path, and a
/// hostile client can send `../` sequences; neither may reach the filesystem.
pub fn sanitize_filename(raw: &str) -> Option<String> {
    let name = raw.rsplit(|c: char| c == '/' || c == '\\').next().unwrap_or("").trim();

    match name {
        "" | "." | ".." => None,
        name if name.contains('\0') => None,
        name => Some(name.to_owned()),
    }
}

/// Runs both checks, returning the name to store the upload under.
pub fn validate_filename<S: AsRef<str>>(
    raw: &str,
    allowed: &[S],
) -> Result<String, ValidationError> {
    let filename = sanitize_filename(raw).ok_or(ValidationError::EmptyFilename)?;

    if !allowed_file(&filename, allowed) {
        return Err(ValidationError::DisallowedType);
    }

    Ok(filename)
}
