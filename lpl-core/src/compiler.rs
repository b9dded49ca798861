//! Compiler pipeline orchestration.

use std::path::{Path, PathBuf};

use crate::builder;
use crate::checker;
use crate::error::CoreError;
use crate::semantic::Target;

/// Everything one compilation produced.
#[derive(Debug)]
pub struct Compilation {
    /// Checked model of the requested source and its dependencies.
    pub target: Target,
    /// Rendered processor assembly, one instruction per line.
    pub assembly: String,
}

/// Compiles the source named `name` into processor assembly.
///
/// The source and everything it mentions are looked up in the
/// `includes` directories, in order. When `artifacts` is given, the
/// built-in listings and the checked target are recorded there.
pub fn compile(
    name: &str,
    includes: &[PathBuf],
    artifacts: Option<&Path>,
) -> Result<Compilation, CoreError> {
    let target = checker::check(name, includes, artifacts)?;
    let program = builder::build(&target)?;
    Ok(Compilation {
        assembly: program.render(),
        target,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_source(directory: &TempDir, name: &str, contents: &str) {
        let file = directory.path().join(format!("{name}.lpl"));
        std::fs::write(file, contents).expect("test source is written");
    }

    fn compile_in(directory: &TempDir, name: &str) -> Result<Compilation, CoreError> {
        compile(name, &[directory.path().to_path_buf()], None)
    }

    #[test]
    fn folded_constants_compile_to_immediates() {
        let directory = TempDir::new().expect("temp directory");
        write_source(
            &directory,
            "main",
            "const x = 1 + 2 * 3;\nentrypoint { print(x); }\n",
        );
        let compilation = compile_in(&directory, "main").expect("main compiles");
        assert_eq!(compilation.assembly, "print 7\nend\n");
    }

    #[test]
    fn compilation_is_deterministic() {
        let directory = TempDir::new().expect("temp directory");
        write_source(&directory, "lib", "public var seen = 0;\n");
        write_source(
            &directory,
            "main",
            "var total = 0;\nentrypoint { lib::seen = total + 1; }\n",
        );
        let first = compile_in(&directory, "main").expect("main compiles");
        let second = compile_in(&directory, "main").expect("main compiles again");
        assert_eq!(first.assembly, second.assembly);
        assert_eq!(first.target, second.target);
    }

    #[test]
    fn include_directories_are_searched_in_order() {
        let near = TempDir::new().expect("temp directory");
        let far = TempDir::new().expect("temp directory");
        write_source(&near, "main", "entrypoint { print(dep::v); }\n");
        write_source(&near, "dep", "public const v = 1;\n");
        write_source(&far, "dep", "public const v = 2;\n");
        let includes = [near.path().to_path_buf(), far.path().to_path_buf()];
        let compilation = compile("main", &includes, None).expect("main compiles");
        assert_eq!(compilation.assembly, "print 1\nend\n");
    }

    #[test]
    fn artifacts_are_recorded_when_requested() {
        let directory = TempDir::new().expect("temp directory");
        write_source(&directory, "main", "entrypoint { }\n");
        let artifacts = directory.path().join("artifacts");
        compile(
            "main",
            &[directory.path().to_path_buf()],
            Some(&artifacts),
        )
        .expect("main compiles");
        let variables = std::fs::read_to_string(artifacts.join("builtin.variable.lpl"))
            .expect("variable listing is recorded");
        assert!(variables.contains("# @copper"));
        let procedures = std::fs::read_to_string(artifacts.join("builtin.procedure.lpl"))
            .expect("procedure listing is recorded");
        assert!(procedures.contains("# print"));
        let dump = std::fs::read_to_string(artifacts.join("main.target.lpl"))
            .expect("target dump is recorded");
        assert!(dump.starts_with("Target {"));
    }

    #[test]
    fn diagnostics_point_at_the_offending_file() {
        let directory = TempDir::new().expect("temp directory");
        write_source(&directory, "main", "const = 1;\n");
        let error = compile_in(&directory, "main").expect_err("missing name is fatal");
        let message = error.to_string();
        assert!(message.contains("main.lpl:1:7"));
        assert!(message.contains("expected"));
    }

    #[test]
    fn in_out_parameters_swap_values_end_to_end() {
        let directory = TempDir::new().expect("temp directory");
        write_source(
            &directory,
            "main",
            "proc swap(a&, b&) { var t = a; a = b; b = t; }\n\
             entrypoint { var x = 1; var y = 2; swap(x, y); }\n",
        );
        let compilation = compile_in(&directory, "main").expect("main compiles");
        assert_eq!(
            compilation.assembly,
            "set main$entrypoint$x 1\n\
             set main$entrypoint$y 2\n\
             set _0 null\n\
             set main$swap$a main$entrypoint$x\n\
             set main$swap$b main$entrypoint$y\n\
             set main$swap$t main$swap$a\n\
             set main$swap$a main$swap$b\n\
             set main$swap$b main$swap$t\n\
             set main$entrypoint$x main$swap$a\n\
             set main$entrypoint$y main$swap$b\n\
             end\n"
        );
    }
}
