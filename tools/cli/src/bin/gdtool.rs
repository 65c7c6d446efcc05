use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use gd_assets::{BundleBuilder, ResourceBundle, PROJECT_SOURCE_ENTRY};
use gd_project::{
    demangle_scene_name, scene_entry_symbol, version, Compatibility, DecodeWarning,
    DocumentMigrator, InstructionCatalog, LoadProfile, MigrationReport, ObjectFactory, ProjectCodec,
    ProjectDocument, VersionTuple, CURRENT_VERSION,
};
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::{info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use walkdir::WalkDir;

#[derive(Parser)]
#[command(author, version, about = "Game project authoring tool")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Upgrade a project document to the current format.
    Migrate {
        project: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
        /// JSON instruction catalog used to insert code-only parameters.
        #[arg(long)]
        catalog: Option<PathBuf>,
        /// Write the migration report as YAML.
        #[arg(long)]
        report: Option<PathBuf>,
    },
    /// Check that the player would accept a project document.
    Validate {
        project: PathBuf,
        #[arg(long)]
        catalog: Option<PathBuf>,
    },
    /// Build a resource bundle from a project document and a resource folder.
    Pack {
        project: PathBuf,
        #[arg(long)]
        resources: Option<PathBuf>,
        #[arg(short, long)]
        output: PathBuf,
        /// Write a sha256 manifest of the packed entries as YAML.
        #[arg(long)]
        manifest: Option<PathBuf>,
    },
    /// List the entries of a resource bundle.
    Inspect {
        bundle: PathBuf,
        /// Print the decrypted project source instead.
        #[arg(long, default_value_t = false)]
        source: bool,
    },
    /// Print the code module symbol of each scene name.
    Mangle {
        names: Vec<String>,
        #[arg(long, default_value_t = false)]
        reverse: bool,
    },
}

#[derive(Debug, Serialize)]
struct MigrationSummary {
    source: String,
    report: MigrationReport,
}

#[derive(Debug, Serialize)]
struct ValidationSummary {
    name: String,
    version: VersionTuple,
    scenes: Vec<String>,
    objects: usize,
    instructions: usize,
    warnings: Vec<DecodeWarning>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
struct PackedEntry {
    sha256: String,
    size: u64,
}

#[derive(Debug, Serialize)]
struct PackManifest {
    format_version: u16,
    entries: BTreeMap<String, PackedEntry>,
}

#[derive(Debug, Serialize)]
struct BundleListing {
    path: String,
    entries: Vec<gd_assets::BundleEntry>,
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Migrate {
            project,
            output,
            catalog,
            report,
        } => migrate_project(&project, &output, catalog.as_deref(), report.as_deref()),
        Command::Validate { project, catalog } => validate_project(&project, catalog.as_deref()),
        Command::Pack {
            project,
            resources,
            output,
            manifest,
        } => pack_bundle(&project, resources.as_deref(), &output, manifest.as_deref()),
        Command::Inspect { bundle, source } => inspect_bundle(&bundle, source),
        Command::Mangle { names, reverse } => {
            for line in mangle_names(&names, reverse)? {
                println!("{line}");
            }
            Ok(())
        }
    }
}

fn load_catalog(path: Option<&Path>) -> Result<InstructionCatalog> {
    match path {
        Some(path) => InstructionCatalog::load(path)
            .with_context(|| format!("load catalog {}", path.display())),
        None => Ok(InstructionCatalog::new()),
    }
}

fn read_document(path: &Path) -> Result<ProjectDocument> {
    let raw = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    ProjectDocument::parse(&raw).with_context(|| format!("parse {}", path.display()))
}

fn write_output(output: &Path, contents: &[u8]) -> Result<()> {
    if let Some(parent) = output.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(output, contents).with_context(|| format!("write {}", output.display()))
}

fn migrate_project(
    path: &Path,
    output: &Path,
    catalog: Option<&Path>,
    report_path: Option<&Path>,
) -> Result<()> {
    let catalog = load_catalog(catalog)?;
    let mut document = read_document(path)?;
    let found = document.version();
    if found.major <= 1 {
        warn!(%found, "legacy project, the player would refuse it before migration");
    }
    if version::compare(found, CURRENT_VERSION) == Compatibility::Newer {
        warn!(%found, "project was saved by a newer release");
    }

    let report = DocumentMigrator::new(&catalog)
        .migrate(&mut document)
        .context("migrate project")?;
    write_output(output, document.to_string_pretty()?.as_bytes())?;
    info!(
        from = %report.from_version,
        to = %report.to_version,
        changed = report.changed(),
        "project migrated"
    );

    let summary = MigrationSummary {
        source: path.display().to_string(),
        report,
    };
    let yaml = serde_yaml::to_string(&summary)?;
    match report_path {
        Some(report_path) => write_output(report_path, yaml.as_bytes())?,
        None => print!("{yaml}"),
    }
    Ok(())
}

fn validate_project(path: &Path, catalog: Option<&Path>) -> Result<()> {
    let catalog = load_catalog(catalog)?;
    let factory = ObjectFactory::default();
    let raw = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let decoded = ProjectCodec::new(&catalog, &factory)
        .with_profile(LoadProfile::Runtime)
        .decode_str(&raw)
        .with_context(|| format!("decode {}", path.display()))?;
    if decoded.project.scenes.is_empty() {
        anyhow::bail!("project has no scene to load");
    }

    let summary = ValidationSummary {
        name: decoded.project.properties.name.clone(),
        version: decoded.migration.from_version,
        scenes: decoded
            .project
            .scenes
            .iter()
            .map(|scene| scene.name.clone())
            .collect(),
        objects: decoded.project.objects.len(),
        instructions: decoded.project.instruction_count(),
        warnings: decoded.warnings,
    };
    print!("{}", serde_yaml::to_string(&summary)?);
    Ok(())
}

fn collect_resources(root: &Path) -> Result<Vec<(String, Vec<u8>)>> {
    let mut resources = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry.with_context(|| format!("walk {}", root.display()))?;
        let path = entry.path();
        if path.is_dir() {
            continue;
        }
        let rel = path.strip_prefix(root).unwrap_or(path);
        let name = rel.to_string_lossy().replace('\\', "/");
        let bytes = fs::read(path).with_context(|| format!("read {}", path.display()))?;
        resources.push((name, bytes));
    }
    Ok(resources)
}

fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    let digest = hasher.finalize();
    digest.iter().map(|byte| format!("{byte:02x}")).collect()
}

fn build_bundle(
    project_source: &str,
    resources: Vec<(String, Vec<u8>)>,
) -> Result<(BundleBuilder, PackManifest)> {
    ProjectDocument::parse(project_source).context("project source is not a valid document")?;

    let mut builder = BundleBuilder::new();
    let mut entries = BTreeMap::new();
    builder.add_project_source(project_source)?;
    entries.insert(
        PROJECT_SOURCE_ENTRY.to_string(),
        PackedEntry {
            sha256: sha256_hex(project_source.as_bytes()),
            size: project_source.len() as u64,
        },
    );
    for (name, bytes) in resources {
        entries.insert(
            name.clone(),
            PackedEntry {
                sha256: sha256_hex(&bytes),
                size: bytes.len() as u64,
            },
        );
        builder
            .add(name.clone(), bytes)
            .with_context(|| format!("pack {name}"))?;
    }
    let manifest = PackManifest {
        format_version: gd_assets::bundle::BUNDLE_FORMAT_VERSION,
        entries,
    };
    Ok((builder, manifest))
}

fn pack_bundle(
    project: &Path,
    resources: Option<&Path>,
    output: &Path,
    manifest_path: Option<&Path>,
) -> Result<()> {
    let source =
        fs::read_to_string(project).with_context(|| format!("read {}", project.display()))?;
    let resources = match resources {
        Some(root) => collect_resources(root)?,
        None => Vec::new(),
    };
    let (builder, manifest) = build_bundle(&source, resources)?;
    write_output(output, &builder.to_bytes()?)?;
    info!(entries = builder.len(), output = %output.display(), "bundle written");

    if let Some(manifest_path) = manifest_path {
        write_output(manifest_path, serde_yaml::to_string(&manifest)?.as_bytes())?;
    }
    Ok(())
}

fn inspect_bundle(path: &Path, source: bool) -> Result<()> {
    let bundle =
        ResourceBundle::open(path).with_context(|| format!("open bundle {}", path.display()))?;
    if source {
        let bytes = bundle.read_project_source().context("decrypt project source")?;
        println!("{}", String::from_utf8_lossy(&bytes));
        return Ok(());
    }
    let listing = BundleListing {
        path: path.display().to_string(),
        entries: bundle.entries().to_vec(),
    };
    print!("{}", serde_yaml::to_string(&listing)?);
    Ok(())
}

fn mangle_names(names: &[String], reverse: bool) -> Result<Vec<String>> {
    names
        .iter()
        .map(|name| {
            if reverse {
                let symbol = name
                    .strip_prefix(gd_project::mangler::SCENE_SYMBOL_PREFIX)
                    .unwrap_or(name);
                demangle_scene_name(symbol)
                    .with_context(|| format!("'{name}' is not a mangled scene name"))
            } else {
                Ok(scene_entry_symbol(name))
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const CURRENT_SOURCE: &str =
        r#"{"GDVersion":{"Major":2,"Minor":2,"Build":11120,"Revision":0},"Scenes":[]}"#;

    #[test]
    fn packed_bundle_holds_source_and_resources() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::create_dir_all(dir.path().join("res/images")).expect("mkdir");
        fs::write(dir.path().join("res/images/hero.png"), [1u8, 2, 3]).expect("write image");
        fs::write(dir.path().join("res/intro.txt"), "hello").expect("write text");

        let resources = collect_resources(&dir.path().join("res")).expect("collect");
        let (builder, manifest) = build_bundle(CURRENT_SOURCE, resources).expect("build");
        let path = dir.path().join("gam.egd");
        builder.write(&path).expect("write bundle");

        let bundle = ResourceBundle::open(&path).expect("open");
        let names: Vec<&str> = bundle.names().collect();
        assert_eq!(names, vec!["src", "images/hero.png", "intro.txt"]);
        assert_eq!(
            bundle.read_project_source().expect("source"),
            CURRENT_SOURCE.as_bytes()
        );
        assert_eq!(manifest.entries["intro.txt"].size, 5);
        assert_eq!(
            manifest.entries["intro.txt"].sha256,
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
    }

    #[test]
    fn pack_rejects_invalid_source() {
        assert!(build_bundle("not json", Vec::new()).is_err());
    }

    #[test]
    fn mangle_round_trips() {
        let names = vec!["My Scene #1".to_string()];
        let symbols = mangle_names(&names, false).expect("mangle");
        assert_eq!(symbols, vec![scene_entry_symbol("My Scene #1")]);
        let back = mangle_names(&symbols, true).expect("demangle");
        assert_eq!(back, names);
    }

    #[test]
    fn migrate_writes_upgraded_document_and_report() {
        let dir = tempfile::tempdir().expect("tempdir");
        let input = dir.path().join("old.json");
        fs::write(
            &input,
            r#"{"GDVersion":{"Major":2,"Minor":0,"Build":10000,"Revision":0},
                "Info":{"Name":"Old"},"Images":[{"name":"hero","file":"hero.png"}],
                "Scenes":[]}"#,
        )
        .expect("write project");
        let output = dir.path().join("out/new.json");
        let report = dir.path().join("out/report.yaml");

        migrate_project(&input, &output, None, Some(&report)).expect("migrate");

        let migrated = read_document(&output).expect("read migrated");
        assert_eq!(migrated.version(), CURRENT_VERSION);
        let report = fs::read_to_string(report).expect("read report");
        assert!(report.contains("not_backward_compatible"));
    }
}
