//! Subcommand implementations

use anyhow::{bail, Context, Result};
use modelview_core::hierarchy::{render_tree, HierarchyWalker};
use modelview_core::inspector::MeshStats;
use modelview_core::storage::{list_remote_files, upload_export, ObjectStore};
use modelview_core::{load_gltf, LoadOutcome, Session, ViewerConfig};
use modelview_store::HttpObjectStore;
use std::fmt::Write as _;
use tracing::{info, warn};

fn is_url(source: &str) -> bool {
    source.starts_with("http://") || source.starts_with("https://")
}

fn open_store(config: &ViewerConfig) -> Result<HttpObjectStore> {
    if !config.store.is_enabled() {
        bail!("No bucket configured; set [store].bucket or pass --bucket");
    }
    Ok(HttpObjectStore::from_config(&config.store)?)
}

async fn read_source(config: &ViewerConfig, source: &str) -> Result<Vec<u8>> {
    if is_url(source) {
        let store = HttpObjectStore::from_config(&config.store)?;
        Ok(store
            .fetch(source)
            .await
            .with_context(|| format!("Failed to fetch {source}"))?)
    } else {
        tokio::fs::read(source)
            .await
            .with_context(|| format!("Failed to read {source}"))
    }
}

/// Load `source` into a fresh session
async fn load_session(config: &ViewerConfig, source: &str) -> Result<Session> {
    let mut session = Session::new(config.clone());
    let ticket = session.begin_load(source);
    let bytes = read_source(config, source).await?;
    match session.complete_load(ticket, source, load_gltf(&bytes)) {
        LoadOutcome::Applied => Ok(session),
        LoadOutcome::Failed(message) => bail!(message),
        LoadOutcome::Stale => bail!("Load of {source} was superseded"),
    }
}

/// Human-readable summary of the loaded model
pub fn describe(session: &Session) -> String {
    let mut out = String::new();
    let Some(graph) = session.graph() else {
        return "No model loaded\n".to_string();
    };
    let d = session.dimensions();
    let _ = writeln!(out, "Model: {}", session.source().unwrap_or("-"));
    let _ = writeln!(out, "Dimensions: {} x {} x {}", d.width, d.height, d.depth);

    out.push_str("\nHierarchy:\n");
    for line in render_tree(graph).lines() {
        let _ = writeln!(out, "  {line}");
    }

    out.push_str("\nMeshes:\n");
    for entry in HierarchyWalker::from_root(graph) {
        if let Some(geometry) = &entry.node.geometry {
            let stats = MeshStats::from_geometry(geometry);
            let _ = writeln!(
                out,
                "  {}: {} vertices, {} edges (approx.), {} triangles",
                entry.label(),
                stats.vertices,
                stats.edges,
                stats.triangles
            );
        }
    }

    out.push_str("\nAnimations:\n");
    // Only the first clip is ever bound to the mixer
    let bound = session.animation().mixer().is_some();
    for (i, clip) in session.clips().iter().enumerate() {
        let marker = if bound && i == 0 {
            " (plays)"
        } else {
            ""
        };
        let _ = writeln!(out, "  [{i}] {} {:.2}s{marker}", clip.name, clip.duration);
    }
    out
}

pub async fn list(config: &ViewerConfig, prefix: Option<&str>) -> Result<()> {
    let store = open_store(config)?;
    let prefix = prefix.unwrap_or(&config.store.prefix);
    let listing = list_remote_files(&store, prefix).await?;
    for entry in &listing.entries {
        println!("{}\t{}", entry.name, entry.url);
    }
    for failure in &listing.failures {
        warn!(name = %failure.name, error = %failure.error, "Unavailable");
    }
    info!(count = listing.entries.len(), "Listed models");
    Ok(())
}

pub async fn inspect(config: &ViewerConfig, source: &str) -> Result<()> {
    let session = load_session(config, source).await?;
    print!("{}", describe(&session));
    Ok(())
}

pub async fn export(config: &ViewerConfig, source: &str, output: Option<&str>) -> Result<()> {
    let mut session = load_session(config, source).await?;
    let Some(file) = session.export_local(output)? else {
        bail!("Nothing to export");
    };
    tokio::fs::write(&file.name, file.contents.as_bytes())
        .await
        .with_context(|| format!("Failed to write {}", file.name))?;
    println!("Exported {}", file.name);
    Ok(())
}

pub async fn upload(config: &ViewerConfig, source: &str, name: Option<&str>) -> Result<()> {
    let store = open_store(config)?;
    let mut session = load_session(config, source).await?;
    let Some(file) = session.export_remote(name)? else {
        bail!("Nothing to export");
    };
    let notice = upload_export(&store, &config.store.prefix, &file.name, file.contents).await?;
    println!("{notice}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use modelview_core::animation::AnimationClip;
    use modelview_core::loader::LoadedModel;
    use modelview_core::scene_graph::{Geometry, Node, SceneGraph};
    use tempfile::TempDir;

    fn session_with_mesh() -> Session {
        let mut graph = SceneGraph::new("Scene");
        let group = graph.add_child(graph.root(), Node::new("group")).unwrap();
        graph
            .add_child(
                group,
                Node::new("wheel").with_geometry(Geometry::new(vec![Default::default(); 9], None)),
            )
            .unwrap();
        let mut session = Session::default();
        session.replace_model(
            "wheel.glb",
            LoadedModel {
                graph,
                clips: vec![
                    AnimationClip::new("spin", Vec::new()),
                    AnimationClip::new("bounce", Vec::new()),
                ],
            },
        );
        session
    }

    #[test]
    fn test_describe_lists_tree_meshes_and_clips() {
        let text = describe(&session_with_mesh());
        assert!(text.contains("Model: wheel.glb"));
        assert!(text.contains("      wheel\n"));
        assert!(text.contains("wheel: 9 vertices, 9 edges (approx.), 3 triangles"));
        assert!(text.contains("[0] spin 0.00s (plays)"));
        assert!(text.contains("[1] bounce 0.00s\n"));
    }

    #[test]
    fn test_describe_without_model() {
        assert_eq!(describe(&Session::default()), "No model loaded\n");
    }

    #[test]
    fn test_is_url() {
        assert!(is_url("https://example.com/a.glb"));
        assert!(!is_url("models/a.glb"));
    }

    #[test]
    fn test_store_requires_bucket() {
        assert!(open_store(&ViewerConfig::default()).is_err());
    }

    #[tokio::test]
    async fn test_load_session_reports_bad_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("broken.glb");
        std::fs::write(&path, b"not a model").unwrap();
        let err = load_session(&ViewerConfig::default(), path.to_str().unwrap())
            .await
            .err()
            .unwrap();
        assert!(err.to_string().starts_with("Failed to load model"));
    }
}
