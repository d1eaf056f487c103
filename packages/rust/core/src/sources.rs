//! Source discovery, `--file` resolution, and build directory cleanup.

use std::path::{Path, PathBuf};

use tracing::{debug, info, instrument};

use docbuild_shared::{DocBuildError, ProjectLayout, Result};

/// Sorted Markdown sources in the source directory.
pub fn markdown_sources(layout: &ProjectLayout) -> Result<Vec<PathBuf>> {
    files_with_extension(&layout.src_dir, "md")
}

/// Sorted Mermaid sources in the diagrams directory.
pub fn diagram_sources(layout: &ProjectLayout) -> Result<Vec<PathBuf>> {
    files_with_extension(&layout.diagrams_src, "mmd")
}

/// Resolve the documents to build.
///
/// Without a request every Markdown source is built. A request may be a
/// path to an existing file, a file name inside the source directory, or
/// a file name without its `.md` extension.
#[instrument(skip(layout))]
pub fn resolve_source_files(layout: &ProjectLayout, requested: Option<&str>) -> Result<Vec<PathBuf>> {
    let Some(requested) = requested else {
        let files = markdown_sources(layout)?;
        if files.is_empty() {
            return Err(DocBuildError::NoSources {
                dir: layout.src_dir.clone(),
            });
        }
        return Ok(files);
    };

    let candidate = Path::new(requested);

    if candidate.is_file() {
        let resolved = std::fs::canonicalize(candidate)
            .map_err(|e| DocBuildError::io(candidate, e))?;
        return Ok(vec![resolved]);
    }

    if let Some(name) = candidate.file_name() {
        let in_src = layout.src_dir.join(name);
        if in_src.is_file() {
            return Ok(vec![in_src]);
        }

        if candidate.extension().is_none() {
            let mut with_ext = name.to_os_string();
            with_ext.push(".md");
            let in_src = layout.src_dir.join(with_ext);
            if in_src.is_file() {
                return Ok(vec![in_src]);
            }
        }
    }

    let available = markdown_sources(layout)
        .unwrap_or_default()
        .iter()
        .filter_map(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
        .collect();

    Err(DocBuildError::SourceNotFound {
        requested: requested.to_string(),
        searched: layout.src_dir.clone(),
        available,
    })
}

/// Remove the build directory. Returns `false` if there was nothing to remove.
#[instrument(skip_all, fields(build_dir = %layout.build_dir.display()))]
pub fn clean(layout: &ProjectLayout) -> Result<bool> {
    if !layout.build_dir.exists() {
        debug!("build directory absent, nothing to clean");
        return Ok(false);
    }

    std::fs::remove_dir_all(&layout.build_dir)
        .map_err(|e| DocBuildError::io(&layout.build_dir, e))?;
    info!("removed build directory");
    Ok(true)
}

fn files_with_extension(dir: &Path, ext: &str) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }

    let entries = std::fs::read_dir(dir).map_err(|e| DocBuildError::io(dir, e))?;
    let mut files = Vec::new();
    for entry in entries {
        let path = entry.map_err(|e| DocBuildError::io(dir, e))?.path();
        if path.is_file() && path.extension().is_some_and(|e| e == ext) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use docbuild_shared::PathsConfig;

    fn temp_project() -> ProjectLayout {
        let root = std::env::temp_dir().join(format!("docbuild-src-{}", uuid::Uuid::now_v7()));
        let layout = ProjectLayout::resolve(root, &PathsConfig::default());
        std::fs::create_dir_all(&layout.diagrams_src).expect("create dirs");
        layout
    }

    fn touch(path: &Path) {
        std::fs::write(path, "# Title\n").expect("write file");
    }

    #[test]
    fn lists_sources_sorted_by_extension() {
        let layout = temp_project();
        touch(&layout.src_dir.join("zeta.md"));
        touch(&layout.src_dir.join("alpha.md"));
        touch(&layout.src_dir.join("notes.txt"));
        touch(&layout.diagrams_src.join("flow.mmd"));

        let md = markdown_sources(&layout).expect("list md");
        let names: Vec<_> = md.iter().map(|p| p.file_name().unwrap().to_owned()).collect();
        assert_eq!(names, vec!["alpha.md", "zeta.md"]);

        let mmd = diagram_sources(&layout).expect("list mmd");
        assert_eq!(mmd, vec![layout.diagrams_src.join("flow.mmd")]);

        let _ = std::fs::remove_dir_all(&layout.root);
    }

    #[test]
    fn resolve_all_requires_sources() {
        let layout = temp_project();
        let err = resolve_source_files(&layout, None).unwrap_err();
        assert!(matches!(err, DocBuildError::NoSources { .. }));
        let _ = std::fs::remove_dir_all(&layout.root);
    }

    #[test]
    fn resolve_by_name_with_and_without_extension() {
        let layout = temp_project();
        touch(&layout.src_dir.join("budget-process.md"));

        let by_name = resolve_source_files(&layout, Some("budget-process.md")).expect("by name");
        assert_eq!(by_name, vec![layout.src_dir.join("budget-process.md")]);

        let by_stem = resolve_source_files(&layout, Some("budget-process")).expect("by stem");
        assert_eq!(by_stem, vec![layout.src_dir.join("budget-process.md")]);

        let _ = std::fs::remove_dir_all(&layout.root);
    }

    #[test]
    fn resolve_existing_path_outside_src() {
        let layout = temp_project();
        let outside = layout.root.join("extra.md");
        touch(&outside);

        let resolved = resolve_source_files(&layout, Some(outside.to_str().unwrap()))
            .expect("by path");
        assert_eq!(resolved, vec![std::fs::canonicalize(&outside).unwrap()]);

        let _ = std::fs::remove_dir_all(&layout.root);
    }

    #[test]
    fn unknown_file_lists_available() {
        let layout = temp_project();
        touch(&layout.src_dir.join("intro.md"));

        let err = resolve_source_files(&layout, Some("missing")).unwrap_err();
        match err {
            DocBuildError::SourceNotFound {
                requested,
                available,
                ..
            } => {
                assert_eq!(requested, "missing");
                assert_eq!(available, vec!["intro.md".to_string()]);
            }
            other => panic!("expected SourceNotFound, got {other:?}"),
        }

        let _ = std::fs::remove_dir_all(&layout.root);
    }

    #[test]
    fn clean_removes_build_dir_once() {
        let layout = temp_project();
        std::fs::create_dir_all(&layout.diagrams_out).expect("create build dir");
        touch(&layout.build_dir.join("intro.docx"));

        assert!(clean(&layout).expect("first clean"));
        assert!(!layout.build_dir.exists());
        assert!(!clean(&layout).expect("second clean"));

        let _ = std::fs::remove_dir_all(&layout.root);
    }
}
