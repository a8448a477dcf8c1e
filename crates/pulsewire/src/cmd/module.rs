use std::path::PathBuf;

use pulsewire_client::ModuleArgs;

use crate::cmd::{connect, LoadModuleArgs, UnloadModuleArgs};
use crate::exit::{client_error, CliError, CliResult, SUCCESS, USAGE};

pub fn run_load(args: LoadModuleArgs, server: Option<PathBuf>) -> CliResult<i32> {
    let module_args = build_args(&args.args)?;

    let mut client = connect(server)?;
    let result = client.load_module(&args.name, &module_args);
    client.close();

    let index = result.map_err(|err| client_error("load module failed", err))?;
    println!("{index}");
    Ok(SUCCESS)
}

pub fn run_unload(args: UnloadModuleArgs, server: Option<PathBuf>) -> CliResult<i32> {
    let mut client = connect(server)?;
    let result = client.unload_module(args.index);
    client.close();

    result.map_err(|err| client_error("unload module failed", err))?;
    Ok(SUCCESS)
}

/// Command-line `key=value` pairs become typed module arguments: bare
/// integers and booleans stay bare on the wire, everything else is a
/// quoted string.
fn build_args(pairs: &[String]) -> CliResult<ModuleArgs> {
    let mut out = ModuleArgs::new();
    for pair in pairs {
        let (key, value) = pair.split_once('=').ok_or_else(|| {
            CliError::new(USAGE, format!("module arguments are key=value, got '{pair}'"))
        })?;
        out = if let Ok(int) = value.parse::<i64>() {
            out.int(key, int)
        } else if let Ok(boolean) = value.parse::<bool>() {
            out.boolean(key, boolean)
        } else {
            out.string(key, value)
        };
    }
    Ok(out)
}
