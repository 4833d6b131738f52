//! Role tags carried in session claims

use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// Authorization role attached to a user record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Regular alumni member
    Alumni,
    /// Association administrator
    Admin,
}

impl Role {
    /// Get the role name as stored in the database
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Alumni => "alumni",
            Role::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "alumni" => Ok(Role::Alumni),
            "admin" => Ok(Role::Admin),
            other => Err(format!("unknown role: {}", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_parse_is_case_insensitive() {
        assert_eq!("Admin".parse::<Role>(), Ok(Role::Admin));
        assert_eq!(" alumni ".parse::<Role>(), Ok(Role::Alumni));
        assert!("moderator".parse::<Role>().is_err());
    }

    #[test]
    fn test_role_serializes_lowercase() {
        let json = serde_json::to_string(&vec![Role::Alumni, Role::Admin]).unwrap();
        assert_eq!(json, r#"["alumni","admin"]"#);
    }
}
