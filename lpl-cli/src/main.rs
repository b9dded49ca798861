use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use lpl_core::compile;

/// コマンドライン引数を定義するための構造体
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Name of the source to compile, without the `.lpl` extension
    target: String,

    #[arg(
        short = 'I',
        long = "include",
        value_name = "DIRECTORY",
        help = "Additional directory searched for sources (repeatable)"
    )]
    include: Vec<PathBuf>,

    #[arg(
        short,
        long,
        value_name = "PATH",
        help = "Where to write the assembly (defaults to <target>.lasm)"
    )]
    output: Option<PathBuf>,

    #[arg(
        long,
        value_name = "DIRECTORY",
        help = "Record the built-in listings and the checked target here"
    )]
    artifacts: Option<PathBuf>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    execute(cli)
}

fn execute(cli: Cli) -> Result<()> {
    let mut includes = vec![PathBuf::from(".")];
    includes.extend(cli.include.iter().cloned());

    let compilation = compile(&cli.target, &includes, cli.artifacts.as_deref())
        .with_context(|| format!("failed to compile `{}`", cli.target))?;

    let output = cli
        .output
        .unwrap_or_else(|| PathBuf::from(format!("{}.lasm", cli.target)));
    write_output(&output, &compilation.assembly)
}

fn write_output(path: &Path, assembly: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create directory {parent:?}"))?;
        }
    }
    fs::write(path, assembly).with_context(|| format!("failed to write output file {path:?}"))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use assert_cmd::Command;
    use predicates::prelude::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn compiles_a_source_from_an_include_directory() {
        let dir = tempdir().expect("tempdir");
        fs::write(dir.path().join("blink.lpl"), "entrypoint { print(7); }\n")
            .expect("write source");
        let output_path = dir.path().join("blink.lasm");

        Command::cargo_bin("lpl-cli")
            .expect("binary exists")
            .arg("blink")
            .arg("--include")
            .arg(dir.path())
            .arg("--output")
            .arg(&output_path)
            .assert()
            .success();

        let assembly = fs::read_to_string(&output_path).expect("read assembly");
        assert_eq!(assembly, "print 7\nend\n");
    }

    #[test]
    fn searches_the_current_directory_and_names_the_output_after_the_target() {
        let dir = tempdir().expect("tempdir");
        fs::write(dir.path().join("blink.lpl"), "entrypoint { print(7); }\n")
            .expect("write source");

        Command::cargo_bin("lpl-cli")
            .expect("binary exists")
            .current_dir(dir.path())
            .arg("blink")
            .assert()
            .success();

        let assembly = fs::read_to_string(dir.path().join("blink.lasm")).expect("read assembly");
        assert_eq!(assembly, "print 7\nend\n");
    }

    #[test]
    fn creates_missing_output_directories() {
        let dir = tempdir().expect("tempdir");
        fs::write(dir.path().join("blink.lpl"), "entrypoint { }\n").expect("write source");
        let output_path = dir.path().join("nested").join("out").join("blink.lasm");

        Command::cargo_bin("lpl-cli")
            .expect("binary exists")
            .arg("blink")
            .arg("-I")
            .arg(dir.path())
            .arg("-o")
            .arg(&output_path)
            .assert()
            .success();

        assert!(output_path.exists(), "assembly output was not created");
    }

    #[test]
    fn records_artifacts_when_requested() {
        let dir = tempdir().expect("tempdir");
        fs::write(dir.path().join("blink.lpl"), "entrypoint { }\n").expect("write source");
        let artifacts = dir.path().join("artifacts");

        Command::cargo_bin("lpl-cli")
            .expect("binary exists")
            .arg("blink")
            .arg("-I")
            .arg(dir.path())
            .arg("-o")
            .arg(dir.path().join("blink.lasm"))
            .arg("--artifacts")
            .arg(&artifacts)
            .assert()
            .success();

        assert!(artifacts.join("builtin.variable.lpl").exists());
        assert!(artifacts.join("builtin.procedure.lpl").exists());
        assert!(artifacts.join("blink.target.lpl").exists());
    }

    #[test]
    fn reports_missing_sources() {
        let dir = tempdir().expect("tempdir");

        Command::cargo_bin("lpl-cli")
            .expect("binary exists")
            .arg("absent")
            .arg("-I")
            .arg(dir.path())
            .assert()
            .failure()
            .stderr(predicate::str::contains(
                "could not find a source named `absent`",
            ));
    }

    #[test]
    fn reports_diagnostics_with_their_location() {
        let dir = tempdir().expect("tempdir");
        fs::write(dir.path().join("blink.lpl"), "entrypoint { print(x); }\n")
            .expect("write source");

        Command::cargo_bin("lpl-cli")
            .expect("binary exists")
            .arg("blink")
            .arg("-I")
            .arg(dir.path())
            .assert()
            .failure()
            .stderr(predicate::str::contains("failed to compile `blink`"))
            .stderr(predicate::str::contains("blink.lpl:1:20"))
            .stderr(predicate::str::contains("could not find the symbol `x`"));
    }
}
