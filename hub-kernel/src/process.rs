//! Subprocess-backed packages.
//!
//! A package built for this source ships `dist/manifest.json`:
//!
//! ```json
//! {
//!   "name": "sheets",
//!   "version": "1.4.0",
//!   "command": ["bin/sheets"],
//!   "health_command": ["bin/sheets", "--health"],
//!   "tools": [
//!     { "name": "list_sheets", "description": "...", "mutates": false,
//!       "input_schema": { "type": "object" } }
//!   ]
//! }
//! ```
//!
//! Each call runs `command` followed by the tool name in the package root,
//! with the JSON arguments on stdin. Stdout is the result text.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use hub_primitives::{
    HandlerError, HealthCheck, HealthReport, PackageManifest, ToolDefinition, ToolHandler,
};
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use crate::loader::{ManifestSource, PackageLayout, PackageLoadError};

#[derive(Debug, Deserialize)]
struct ManifestFile {
    name: String,
    version: String,
    command: Vec<String>,
    #[serde(default)]
    health_command: Option<Vec<String>>,
    tools: Vec<ToolEntry>,
}

#[derive(Debug, Deserialize)]
struct ToolEntry {
    name: String,
    #[serde(default)]
    description: String,
    #[serde(default = "object_schema")]
    input_schema: Value,
    mutates: bool,
}

fn object_schema() -> Value {
    json!({ "type": "object" })
}

/// Loads packages from their on-disk manifest and runs tools as subprocesses.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessSource;

impl ProcessSource {
    /// Creates the source.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ManifestSource for ProcessSource {
    async fn load(
        &self,
        _name: &str,
        layout: &PackageLayout,
    ) -> Result<PackageManifest, PackageLoadError> {
        layout.ensure_built().await?;

        let raw = tokio::fs::read_to_string(layout.entry_point())
            .await
            .map_err(|err| match err.kind() {
                std::io::ErrorKind::NotFound => PackageLoadError::NotBuilt {
                    dist: layout.entry_point().to_path_buf(),
                },
                _ => PackageLoadError::failure(format!(
                    "reading {}: {err}",
                    layout.entry_point().display()
                )),
            })?;

        let file: ManifestFile = serde_json::from_str(&raw)
            .map_err(|err| PackageLoadError::malformed(err.to_string()))?;

        build_manifest(file, layout.root())
    }
}

fn build_manifest(file: ManifestFile, root: &Path) -> Result<PackageManifest, PackageLoadError> {
    let command = CommandSpec::resolve(&file.command, root)
        .ok_or_else(|| PackageLoadError::malformed("`command` must not be empty"))?;

    let mut builder = PackageManifest::builder()
        .name(file.name)
        .and_then(|b| b.version(file.version))
        .map_err(|err| PackageLoadError::malformed(err.to_string()))?;

    for entry in file.tools {
        let handler = ProcessHandler {
            command: command.clone(),
            tool: entry.name.clone(),
        };
        let tool = ToolDefinition::builder(entry.name)
            .description(entry.description)
            .parameter_schema(entry.input_schema)
            .mutates(entry.mutates)
            .handler(handler)
            .build()
            .map_err(|err| PackageLoadError::malformed(err.to_string()))?;
        builder = builder.tool(tool);
    }

    if let Some(health) = file.health_command {
        let command = CommandSpec::resolve(&health, root)
            .ok_or_else(|| PackageLoadError::malformed("`health_command` must not be empty"))?;
        builder = builder.health_check(ProcessHealthCheck { command });
    }

    builder
        .build()
        .map_err(|err| PackageLoadError::malformed(err.to_string()))
}

#[derive(Debug, Clone)]
struct CommandSpec {
    program: PathBuf,
    args: Vec<String>,
    cwd: PathBuf,
}

impl CommandSpec {
    fn resolve(parts: &[String], root: &Path) -> Option<Self> {
        let (program, args) = parts.split_first()?;
        if program.trim().is_empty() {
            return None;
        }
        let program = Path::new(program);
        let program = if program.is_relative() && program.components().count() > 1 {
            root.join(program)
        } else {
            program.to_path_buf()
        };
        Some(Self {
            program,
            args: args.to_vec(),
            cwd: root.to_path_buf(),
        })
    }

    async fn run(
        &self,
        extra: Option<&str>,
        stdin: Option<Vec<u8>>,
    ) -> Result<String, HandlerError> {
        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .args(extra)
            .current_dir(&self.cwd)
            .stdin(if stdin.is_some() { Stdio::piped() } else { Stdio::null() })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = command.spawn().map_err(|err| {
            HandlerError::failed(format!("failed to start {}: {err}", self.program.display()))
        })?;

        let pipe = child.stdin.take();
        let feed = async move {
            let (Some(payload), Some(mut pipe)) = (stdin, pipe) else {
                return Ok(());
            };
            match pipe.write_all(&payload).await {
                Err(err) if err.kind() != ErrorKind::BrokenPipe => Err(err),
                _ => Ok(()),
            }
        };

        let (fed, output) = tokio::join!(feed, child.wait_with_output());
        let output =
            output.map_err(|err| HandlerError::failed(format!("failed to collect output: {err}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(HandlerError::failed(format!(
                "{} exited with {}: {}",
                self.program.display(),
                output.status,
                stderr.trim()
            )));
        }
        fed.map_err(|err| HandlerError::failed(format!("failed to send arguments: {err}")))?;

        Ok(String::from_utf8_lossy(&output.stdout).trim_end().to_owned())
    }
}

struct ProcessHandler {
    command: CommandSpec,
    tool: String,
}

#[async_trait]
impl ToolHandler for ProcessHandler {
    async fn call(&self, args: Value) -> Result<String, HandlerError> {
        let payload = serde_json::to_vec(&args)
            .map_err(|err| HandlerError::failed(format!("failed to encode arguments: {err}")))?;
        self.command.run(Some(&self.tool), Some(payload)).await
    }
}

struct ProcessHealthCheck {
    command: CommandSpec,
}

#[async_trait]
impl HealthCheck for ProcessHealthCheck {
    async fn check(&self) -> Result<HealthReport, HandlerError> {
        let stdout = self.command.run(None, None).await?;
        serde_json::from_str(&stdout)
            .map_err(|err| HandlerError::failed(format!("health output is not a report: {err}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_package(root: &Path, manifest: &str) -> PackageLayout {
        let layout = PackageLayout::new(root);
        std::fs::create_dir_all(layout.dist()).unwrap();
        std::fs::write(layout.entry_point(), manifest).unwrap();
        layout
    }

    #[tokio::test]
    async fn loads_declared_tools() {
        let dir = tempfile::tempdir().unwrap();
        let layout = write_package(
            dir.path(),
            r#"{
                "name": "sheets",
                "version": "1.4.0",
                "command": ["bin/sheets"],
                "tools": [
                    { "name": "list_sheets", "mutates": false },
                    { "name": "append_row", "description": "Append", "mutates": true,
                      "input_schema": { "type": "object", "required": ["row"] } }
                ]
            }"#,
        );

        let manifest = ProcessSource::new().load("sheets", &layout).await.unwrap();
        assert_eq!(manifest.version(), "1.4.0");
        assert_eq!(manifest.tools().len(), 2);
        assert!(!manifest.tools()[0].mutates());
        assert!(manifest.tools()[1].mutates());
        assert!(manifest.health_check().is_none());
    }

    #[tokio::test]
    async fn classifies_contract_violations() {
        let source = ProcessSource::new();

        let dir = tempfile::tempdir().unwrap();
        let layout = write_package(
            dir.path(),
            r#"{ "name": "x", "version": "1", "command": ["run"] }"#,
        );
        let err = source.load("x", &layout).await.unwrap_err();
        assert_eq!(err.kind(), "malformed_manifest");
        assert!(err.to_string().contains("tools"));

        let dir = tempfile::tempdir().unwrap();
        let layout = write_package(
            dir.path(),
            r#"{ "name": "x", "version": "1", "command": ["run"],
                 "tools": [{ "name": "write_it" }] }"#,
        );
        let err = source.load("x", &layout).await.unwrap_err();
        assert!(err.to_string().contains("mutates"));

        let dir = tempfile::tempdir().unwrap();
        let layout = write_package(
            dir.path(),
            r#"{ "name": "x", "version": "1", "command": [], "tools": [] }"#,
        );
        let err = source.load("x", &layout).await.unwrap_err();
        assert_eq!(err.kind(), "malformed_manifest");

        let dir = tempfile::tempdir().unwrap();
        let layout = write_package(dir.path(), "not json");
        let err = source.load("x", &layout).await.unwrap_err();
        assert_eq!(err.kind(), "malformed_manifest");

        let dir = tempfile::tempdir().unwrap();
        let err = source
            .load("x", &PackageLayout::new(dir.path()))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "not_built");

        let err = source
            .load("x", &PackageLayout::new(dir.path().join("absent")))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "path_not_found");
    }

    #[test]
    fn relative_programs_resolve_against_root() {
        let root = Path::new("/opt/pkg");
        let spec =
            CommandSpec::resolve(&["bin/tool".to_owned(), "--fast".to_owned()], root).unwrap();
        assert_eq!(spec.program, PathBuf::from("/opt/pkg/bin/tool"));
        assert_eq!(spec.args, ["--fast"]);

        let spec = CommandSpec::resolve(&["python3".to_owned()], root).unwrap();
        assert_eq!(spec.program, PathBuf::from("python3"));

        assert!(CommandSpec::resolve(&Vec::new(), root).is_none());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn runs_tool_as_subprocess() {
        let dir = tempfile::tempdir().unwrap();
        let layout = write_package(
            dir.path(),
            r#"{
                "name": "echo",
                "version": "0.1.0",
                "command": ["sh", "-c", "printf '%s:' \"$0\"; cat"],
                "health_command": ["sh", "-c", "echo '{\"ok\": true, \"details\": {}}'"],
                "tools": [{ "name": "say", "mutates": false }]
            }"#,
        );

        let manifest = ProcessSource::new().load("echo", &layout).await.unwrap();
        let out = manifest.tools()[0]
            .handler()
            .call(json!({ "word": "hi" }))
            .await
            .unwrap();
        assert_eq!(out, r#"say:{"word":"hi"}"#);

        let report = manifest.health_check().unwrap().check().await.unwrap();
        assert!(report.ok);
    }

    #[cfg(unix)]
    fn shell(script: &str) -> CommandSpec {
        let parts = ["sh".to_owned(), "-c".to_owned(), script.to_owned()];
        CommandSpec::resolve(&parts, &std::env::temp_dir()).unwrap()
    }

    #[cfg(unix)]
    fn large_args() -> Vec<u8> {
        serde_json::to_vec(&json!({ "blob": "x".repeat(200_000) })).unwrap()
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn tool_may_exit_without_reading_arguments() {
        let out = shell("echo done")
            .run(Some("say"), Some(large_args()))
            .await
            .unwrap();
        assert_eq!(out, "done");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn tool_may_write_before_reading_arguments() {
        let command = shell("head -c 200000 /dev/zero | tr '\\0' x; cat >/dev/null");
        let out = tokio::time::timeout(
            std::time::Duration::from_secs(10),
            command.run(Some("say"), Some(large_args())),
        )
        .await
        .expect("tool output and arguments should flow concurrently")
        .unwrap();
        assert_eq!(out.len(), 200_000);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn nonzero_exit_carries_stderr() {
        let err = shell("echo boom >&2; exit 3")
            .run(Some("say"), Some(b"{}".to_vec()))
            .await
            .unwrap_err()
            .to_string();
        assert!(err.contains("boom"), "{err}");
        assert!(err.contains("exit status: 3"), "{err}");
    }
}
