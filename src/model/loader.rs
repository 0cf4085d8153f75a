//! Directory-driven model discovery.

use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::config::{DefineOptions, Exclude};
use crate::error::OrmbootError;
use crate::model::ModelDef;

/// Options controlling one load pass over a model directory.
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    pub exclude: Option<Exclude>,
    pub define: DefineOptions,
}

/// Walk `dir` recursively and resolve every definition file into a
/// [`ModelDef`], in sorted path order.
///
/// The exclusion filter is applied to paths relative to `dir`; files that
/// are not valid model definitions (wrong extension, empty) are dropped;
/// `initializer` runs on each accepted definition before it is returned for
/// batch registration. A missing directory yields an empty load.
pub fn load_models(
    dir: &Path,
    opts: &LoadOptions,
    mut initializer: impl FnMut(&mut ModelDef),
) -> Result<Vec<ModelDef>, OrmbootError> {
    if !dir.exists() {
        info!(path = %dir.display(), "model directory not found; skipping load");
        return Ok(Vec::new());
    }

    let mut files = Vec::new();
    collect_files(dir, &mut files)?;
    files.sort();

    let mut models = Vec::new();
    for path in files {
        let rel = path.strip_prefix(dir).unwrap_or(&path);
        if let Some(exclude) = &opts.exclude {
            if exclude.matches(rel) {
                debug!(path = %rel.display(), "model excluded by filter");
                continue;
            }
        }
        match resolve(&path, &opts.define) {
            Ok(Some(mut model)) => {
                initializer(&mut model);
                models.push(model);
            }
            Ok(None) => {
                debug!(path = %rel.display(), "not a model definition; skipped");
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to load model definition");
            }
        }
    }
    Ok(models)
}

fn collect_files(dir: &Path, out: &mut Vec<PathBuf>) -> Result<(), OrmbootError> {
    for entry in fs::read_dir(dir)? {
        let path = match entry {
            Ok(entry) => entry.path(),
            Err(e) => {
                warn!(error = %e, "failed to read model dir entry");
                continue;
            }
        };
        if path.is_dir() {
            collect_files(&path, out)?;
        } else {
            out.push(path);
        }
    }
    Ok(())
}

/// Resolve one file to a model definition, or `None` when the file does not
/// qualify (the validity filter).
fn resolve(path: &Path, define: &DefineOptions) -> Result<Option<ModelDef>, OrmbootError> {
    if !is_sql_file(path) {
        return Ok(None);
    }
    let stem = match path.file_stem().and_then(|s| s.to_str()) {
        Some(stem) => stem,
        None => return Ok(None),
    };
    let source = fs::read_to_string(path).map_err(|e| OrmbootError::ModelLoad {
        path: path.to_path_buf(),
        source: e,
    })?;
    if source.trim().is_empty() {
        return Ok(None);
    }
    Ok(Some(ModelDef::new(
        stem,
        path.to_path_buf(),
        source,
        define,
    )))
}

fn is_sql_file(path: &Path) -> bool {
    path.extension()
        .and_then(|s| s.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("sql"))
        == Some(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn scratch_dir(tag: &str) -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("system time before UNIX_EPOCH")
            .as_nanos();
        let mut dir = std::env::temp_dir();
        dir.push(format!("ormboot-{tag}-{}-{}", std::process::id(), nanos));
        dir
    }

    fn write(dir: &Path, rel: &str, contents: &str) {
        let path = dir.join(rel);
        fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
        fs::write(path, contents).expect("write model file");
    }

    #[test]
    fn walks_recursively_in_sorted_order() {
        let dir = scratch_dir("walk");
        write(&dir, "user.sql", "CREATE TABLE users (id INTEGER);");
        write(&dir, "audit/login_event.sql", "CREATE TABLE login_events (id INTEGER);");
        write(&dir, "README.md", "not a model");
        write(&dir, "empty.sql", "   ");

        let models =
            load_models(&dir, &LoadOptions::default(), |_| {}).expect("load should succeed");
        let names: Vec<_> = models.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["LoginEvent", "User"]);
        assert_eq!(models[0].table_name, "login_event");

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn exclusion_filter_supports_single_prefix_and_set() {
        let dir = scratch_dir("exclude");
        write(&dir, "user.sql", "CREATE TABLE users (id INTEGER);");
        write(&dir, "internal/counter.sql", "CREATE TABLE counters (id INTEGER);");
        write(&dir, "scratch/tmp.sql", "CREATE TABLE tmp (id INTEGER);");

        let single = LoadOptions {
            exclude: Some(Exclude::One("internal".into())),
            ..Default::default()
        };
        let models = load_models(&dir, &single, |_| {}).expect("load should succeed");
        let names: Vec<_> = models.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["Tmp", "User"]);

        let set = LoadOptions {
            exclude: Some(Exclude::Many(vec!["internal".into(), "scratch".into()])),
            ..Default::default()
        };
        let models = load_models(&dir, &set, |_| {}).expect("load should succeed");
        let names: Vec<_> = models.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["User"]);

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn initializer_runs_before_registration() {
        let dir = scratch_dir("init");
        write(&dir, "user.sql", "CREATE TABLE users (id INTEGER);");

        let models = load_models(&dir, &LoadOptions::default(), |m| {
            m.connection = Some("model".to_string());
        })
        .expect("load should succeed");
        assert_eq!(models[0].connection.as_deref(), Some("model"));

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn missing_directory_yields_empty_load() {
        let dir = scratch_dir("missing");
        let models =
            load_models(&dir, &LoadOptions::default(), |_| {}).expect("load should succeed");
        assert!(models.is_empty());
    }
}
