/// Screens reachable through `storyreel open <path>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Landing,
    Editor { project_id: Option<String> },
    ScriptGeneration,
    Projects,
    NotFound(String),
}

impl Route {
    pub fn parse(path: &str) -> Route {
        let trimmed = path.trim();
        let without_query = trimmed
            .split(['?', '#'])
            .next()
            .unwrap_or_default();
        let segments: Vec<&str> = without_query
            .split('/')
            .filter(|s| !s.is_empty())
            .collect();
        match segments.as_slice() {
            [] => Route::Landing,
            ["editor"] => Route::Editor { project_id: None },
            ["editor", id] => Route::Editor {
                project_id: Some((*id).to_string()),
            },
            ["script-generation"] => Route::ScriptGeneration,
            ["projects"] => Route::Projects,
            _ => Route::NotFound(trimmed.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_paths() {
        assert_eq!(Route::parse("/"), Route::Landing);
        assert_eq!(Route::parse(""), Route::Landing);
        assert_eq!(Route::parse("/editor"), Route::Editor { project_id: None });
        assert_eq!(
            Route::parse("/editor/abc-123/"),
            Route::Editor {
                project_id: Some("abc-123".into())
            }
        );
        assert_eq!(Route::parse("/script-generation?from=home"), Route::ScriptGeneration);
        assert_eq!(Route::parse("projects"), Route::Projects);
    }

    #[test]
    fn everything_else_is_not_found() {
        assert_eq!(
            Route::parse("/editor/abc/extra"),
            Route::NotFound("/editor/abc/extra".into())
        );
        assert_eq!(Route::parse("/settings"), Route::NotFound("/settings".into()));
    }
}
