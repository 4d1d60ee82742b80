// src/cli.rs
//
// Command line definition only; turning it into runtime configuration is
// `config.rs`'s job.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::exports::PathStyle;
use crate::importer::Interpreter;

#[derive(Parser, Debug)]
#[command(
    name = "toolchain-validator",
    version,
    about = "Validate CMake presets across GCC, Clang, MSVC and Intel oneAPI"
)]
pub struct Cli {
    #[command(flatten)]
    pub toolchain: ToolchainArgs,

    /// Defaults to `validate`
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Where to look for the Intel setup script and how to run it.
#[derive(Args, Debug, Clone, Default)]
pub struct ToolchainArgs {
    /// Environment variable naming the oneAPI root directly
    #[arg(long = "override-var", value_name = "NAME", global = true)]
    pub override_var: Option<String>,

    /// Installation root to probe, in priority order (replaces the built-in list)
    #[arg(long = "candidate", value_name = "PATH", global = true)]
    pub candidates: Vec<PathBuf>,

    /// Setup script file name beneath the root (setvars.bat / setvars.sh)
    #[arg(long = "script-name", value_name = "FILE", global = true)]
    pub script_name: Option<String>,

    /// Interpreter used to run the setup script
    #[arg(long = "interpreter", value_enum, global = true)]
    pub interpreter: Option<Interpreter>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Configure, build and test every preset in order; stop on first failure
    Validate(ValidateArgs),

    /// Print the path of the Intel setup script; exit 1 when not installed
    Locate,

    /// Print `export` statements for the Intel environment (MSYS2/Cygwin/WSL bash)
    Exports {
        /// Path notation of the target shell
        #[arg(long = "style", value_enum, default_value_t = PathStyle::Msys)]
        style: PathStyle,

        /// Arguments for the setup script (default: intel64)
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },
}

#[derive(Args, Debug, Clone)]
pub struct ValidateArgs {
    /// Project root containing CMakePresets.json (defaults to current directory)
    #[arg(long = "root", value_name = "PATH")]
    pub root: Option<PathBuf>,

    /// Preset to validate, in order (multiple allowed; default: gcc clang msvc intel)
    #[arg(long = "preset", value_name = "NAME")]
    pub presets: Vec<String>,

    /// Ceiling for the Intel setup script, in seconds
    #[arg(long = "timeout-secs", default_value_t = 300)]
    pub timeout_secs: u64,

    /// Configuration passed to ctest for multi-config generators
    #[arg(long = "msvc-config", default_value = "Debug")]
    pub msvc_config: String,

    /// Argument for the Intel setup script (multiple allowed)
    #[arg(long = "setup-arg", value_name = "ARG", allow_hyphen_values = true)]
    pub setup_args: Vec<String>,
}

impl Default for ValidateArgs {
    fn default() -> Self {
        Self {
            root: None,
            presets: Vec::new(),
            timeout_secs: 300,
            msvc_config: "Debug".to_owned(),
            setup_args: Vec::new(),
        }
    }
}
