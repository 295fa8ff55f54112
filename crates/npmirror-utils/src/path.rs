use std::{env, iter::Peekable, path::PathBuf, str::Chars};

use crate::error::{PathError, PathResult};

/// Resolves a path string that may contain environment variables.
///
/// `$VAR` and `${VAR}` are expanded, a leading `~` becomes the home
/// directory, and relative paths are made absolute against the current
/// working directory.
///
/// # Errors
///
/// * [`PathError::Empty`] if the path is empty
/// * [`PathError::CurrentDir`] if the current directory cannot be determined
/// * [`PathError::MissingEnvVar`] if a referenced variable is undefined
/// * [`PathError::UnclosedVariable`] for a `${` without its closing brace
///
/// # Example
///
/// ```no_run
/// use npmirror_utils::path::resolve_path;
///
/// let store = resolve_path("$HOME/.local/share/npmirror/store").unwrap();
/// assert!(store.is_absolute());
/// ```
pub fn resolve_path(path: &str) -> PathResult<PathBuf> {
    let path = path.trim();
    if path.is_empty() {
        return Err(PathError::Empty);
    }

    let expanded = PathBuf::from(expand_variables(path)?);
    if expanded.is_absolute() {
        return Ok(expanded);
    }

    env::current_dir()
        .map(|cwd| cwd.join(expanded))
        .map_err(|err| PathError::CurrentDir { source: err })
}

/// Returns `$HOME`, falling back to the filesystem root when unset.
pub fn home_dir() -> PathBuf {
    env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/"))
}

/// Returns `$XDG_CONFIG_HOME`, or `$HOME/.config`.
pub fn xdg_config_home() -> PathBuf {
    env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".config"))
}

/// Returns `$XDG_DATA_HOME`, or `$HOME/.local/share`.
pub fn xdg_data_home() -> PathBuf {
    env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local/share"))
}

fn expand_variables(path: &str) -> PathResult<String> {
    let mut result = String::with_capacity(path.len());
    let mut chars = path.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '$' if chars.peek() == Some(&'{') => {
                chars.next();
                let name = consume_braced(&mut chars)?;
                push_var(&name, &mut result, path)?;
            }
            '$' => {
                let name = consume_var_name(&mut chars);
                if name.is_empty() {
                    result.push('$');
                } else {
                    push_var(&name, &mut result, path)?;
                }
            }
            '~' if result.is_empty() => result.push_str(&home_dir().to_string_lossy()),
            _ => result.push(c),
        }
    }

    Ok(result)
}

fn consume_braced(chars: &mut Peekable<Chars>) -> PathResult<String> {
    let mut name = String::new();
    for c in chars.by_ref() {
        if c == '}' {
            return Ok(name);
        }
        name.push(c);
    }
    Err(PathError::UnclosedVariable {
        input: format!("${{{name}"),
    })
}

fn consume_var_name(chars: &mut Peekable<Chars>) -> String {
    let mut name = String::new();
    while let Some(&c) = chars.peek() {
        if !(c.is_alphanumeric() || c == '_') {
            break;
        }
        name.push(c);
        chars.next();
    }
    name
}

fn push_var(name: &str, result: &mut String, original: &str) -> PathResult<()> {
    let value = match name {
        "HOME" => home_dir().to_string_lossy().into_owned(),
        "XDG_CONFIG_HOME" => xdg_config_home().to_string_lossy().into_owned(),
        "XDG_DATA_HOME" => xdg_data_home().to_string_lossy().into_owned(),
        _ => {
            env::var(name).map_err(|_| PathError::MissingEnvVar {
                var: name.into(),
                input: original.into(),
            })?
        }
    };
    result.push_str(&value);
    Ok(())
}

#[cfg(test)]
mod tests {
    use serial_test::serial;

    use super::*;

    #[test]
    #[serial]
    fn test_expand_simple_and_braced() {
        env::set_var("NPMIRROR_TEST_VAR", "mirror");
        assert_eq!(
            expand_variables("$NPMIRROR_TEST_VAR/store").unwrap(),
            "mirror/store"
        );
        assert_eq!(
            expand_variables("${NPMIRROR_TEST_VAR}/store").unwrap(),
            "mirror/store"
        );
        env::remove_var("NPMIRROR_TEST_VAR");
    }

    #[test]
    #[serial]
    fn test_expand_errors() {
        assert!(matches!(
            expand_variables("${UNCLOSED"),
            Err(PathError::UnclosedVariable { .. })
        ));
        assert!(matches!(
            expand_variables("$NPMIRROR_DOES_NOT_EXIST/x"),
            Err(PathError::MissingEnvVar { .. })
        ));
    }

    #[test]
    fn test_lone_dollar_is_literal() {
        assert_eq!(expand_variables("/tmp/$/x").unwrap(), "/tmp/$/x");
    }

    #[test]
    #[serial]
    fn test_tilde_and_xdg() {
        env::set_var("HOME", "/tmp/home");
        env::remove_var("XDG_DATA_HOME");
        env::remove_var("XDG_CONFIG_HOME");

        assert_eq!(
            resolve_path("~/store").unwrap(),
            PathBuf::from("/tmp/home/store")
        );
        assert_eq!(xdg_data_home(), PathBuf::from("/tmp/home/.local/share"));
        assert_eq!(xdg_config_home(), PathBuf::from("/tmp/home/.config"));
    }

    #[test]
    fn test_resolve_relative_and_empty() {
        assert!(matches!(resolve_path("   "), Err(PathError::Empty)));

        let resolved = resolve_path("store").unwrap();
        assert!(resolved.is_absolute());
        assert!(resolved.ends_with("store"));
    }
}
