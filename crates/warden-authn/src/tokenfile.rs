//! Static token-file authentication
//!
//! The token file maps opaque bearer tokens to pre-declared identities, one
//! record per line: `token,user,uid[,"group1,group2"]`. The group column is
//! optional and may be quoted to hold a comma-separated list.

use async_trait::async_trait;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use warden_common::UserInfo;

use crate::authenticator::{PRIORITY_TOKEN_FILE, TokenAuthenticator};
use crate::error::AuthnError;

/// Authenticates bearer tokens against a static file loaded at startup.
#[derive(Debug)]
pub struct TokenFileAuthenticator {
    tokens: HashMap<String, UserInfo>,
}

impl TokenFileAuthenticator {
    /// Load a token file. A malformed record aborts the load with an error
    /// carrying the file path and 1-based line number.
    pub fn new_csv(path: impl AsRef<Path>) -> Result<Self, AuthnError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| AuthnError::TokenFileIo {
            path: path.display().to_string(),
            source,
        })?;

        let mut tokens = HashMap::new();
        for (index, line) in contents.lines().enumerate() {
            let line_no = index + 1;
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }

            let fields = split_record(trimmed).map_err(|reason| AuthnError::TokenFile {
                path: path.display().to_string(),
                line: line_no,
                reason,
            })?;
            if fields.len() < 3 {
                return Err(AuthnError::TokenFile {
                    path: path.display().to_string(),
                    line: line_no,
                    reason: format!("expected at least 3 columns, got {}", fields.len()),
                });
            }
            if fields[0].is_empty() {
                return Err(AuthnError::TokenFile {
                    path: path.display().to_string(),
                    line: line_no,
                    reason: "empty token".to_string(),
                });
            }

            let mut user = UserInfo::new(fields[1].clone()).with_uid(fields[2].clone());
            if let Some(groups) = fields.get(3) {
                user.groups = groups
                    .split(',')
                    .map(str::trim)
                    .filter(|g| !g.is_empty())
                    .map(str::to_string)
                    .collect();
            }

            if tokens.insert(fields[0].clone(), user).is_some() {
                tracing::warn!(
                    "duplicate token in file {} at line {line_no}, previous entry overwritten",
                    path.display()
                );
            }
        }

        Ok(Self { tokens })
    }

    /// Number of tokens loaded
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    /// Whether the file contained no tokens
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

/// Split one CSV record, honoring double-quoted fields.
fn split_record(line: &str) -> Result<Vec<String>, String> {
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut chars = line.chars().peekable();
    let mut quoted = false;

    while let Some(c) = chars.next() {
        match c {
            '"' if field.is_empty() && !quoted => quoted = true,
            '"' if quoted => {
                if chars.peek() == Some(&'"') {
                    chars.next();
                    field.push('"');
                } else {
                    quoted = false;
                }
            }
            ',' if !quoted => {
                fields.push(std::mem::take(&mut field));
            }
            _ => field.push(c),
        }
    }
    if quoted {
        return Err("unterminated quoted field".to_string());
    }
    fields.push(field);
    Ok(fields)
}

#[async_trait]
impl TokenAuthenticator for TokenFileAuthenticator {
    fn name(&self) -> &str {
        "token-file"
    }

    fn priority(&self) -> i32 {
        PRIORITY_TOKEN_FILE
    }

    async fn authenticate_token(&self, token: &str) -> Result<Option<UserInfo>, AuthnError> {
        Ok(self.tokens.get(token).cloned())
    }
}
