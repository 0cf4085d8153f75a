//! Model definitions discovered from the filesystem.
//!
//! One `.sql` definition file becomes one [`ModelDef`]; the file stem is
//! normalized to UpperCamelCase and the table name is derived from the
//! datasource's [`DefineOptions`].

pub mod loader;

use std::path::PathBuf;

use crate::config::DefineOptions;

pub use loader::{LoadOptions, load_models};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelDef {
    /// UpperCamelCase model name derived from the file stem.
    pub name: String,
    /// Absolute path of the definition file.
    pub path: PathBuf,
    /// Raw contents of the definition file.
    pub source: String,
    /// Table name derived per the owning datasource's conventions.
    pub table_name: String,
    /// Delegate path of the owning connection, stamped by the loader's
    /// initializer hook before registration.
    pub connection: Option<String>,
}

impl ModelDef {
    pub(crate) fn new(stem: &str, path: PathBuf, source: String, define: &DefineOptions) -> Self {
        let name = upper_camel(stem);
        let table_name = if define.freeze_table_name {
            stem.to_string()
        } else if define.underscored {
            snake_case(&name)
        } else {
            name.clone()
        };
        Self {
            name,
            path,
            source,
            table_name,
            connection: None,
        }
    }
}

/// `user_profile` / `user-profile` / `userProfile` -> `UserProfile`.
pub fn upper_camel(stem: &str) -> String {
    stem.split(['_', '-'])
        .filter(|seg| !seg.is_empty())
        .map(|seg| {
            let mut chars = seg.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect()
}

/// `UserProfile` -> `user_profile`.
pub fn snake_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    for (i, c) in name.chars().enumerate() {
        if c.is_uppercase() {
            if i > 0 {
                out.push('_');
            }
            out.extend(c.to_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stems_normalize_to_upper_camel() {
        assert_eq!(upper_camel("user"), "User");
        assert_eq!(upper_camel("user_profile"), "UserProfile");
        assert_eq!(upper_camel("user-login-audit"), "UserLoginAudit");
        assert_eq!(upper_camel("userProfile"), "UserProfile");
    }

    #[test]
    fn table_name_follows_define_options() {
        let underscored = DefineOptions {
            freeze_table_name: false,
            underscored: true,
        };
        let m = ModelDef::new("user_profile", "x.sql".into(), "CREATE TABLE t();".into(), &underscored);
        assert_eq!(m.name, "UserProfile");
        assert_eq!(m.table_name, "user_profile");

        let frozen = DefineOptions {
            freeze_table_name: true,
            underscored: true,
        };
        let m = ModelDef::new("UserProfile", "x.sql".into(), "CREATE TABLE t();".into(), &frozen);
        assert_eq!(m.table_name, "UserProfile");

        let verbatim = DefineOptions {
            freeze_table_name: false,
            underscored: false,
        };
        let m = ModelDef::new("user_profile", "x.sql".into(), "CREATE TABLE t();".into(), &verbatim);
        assert_eq!(m.table_name, "UserProfile");
    }
}
