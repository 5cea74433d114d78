//! Entry point for the nacre shell.

mod args;

use std::path::Path;

use clap::Parser;

use args::CommandLineArgs;

fn main() {
    let parsed_args = CommandLineArgs::parse();

    let exit_code = match run(parsed_args) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("nacre: {e}");
            1
        }
    };

    #[allow(clippy::cast_lossless)]
    std::process::exit(exit_code as i32);
}

fn run(parsed_args: CommandLineArgs) -> Result<u8, nacre_core::Error> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    runtime.block_on(run_async(parsed_args))
}

async fn run_async(parsed_args: CommandLineArgs) -> Result<u8, nacre_core::Error> {
    let options = parsed_args.to_create_options();
    let mut shell = nacre_core::Shell::new(&options)?;

    // Apply any -o options requested on the command line.
    for option_name in &parsed_args.enabled_options {
        if !shell.options.set_by_name(option_name.as_str(), true) {
            eprintln!("nacre: {option_name}: invalid option name");
            return Ok(2);
        }
    }

    let params = shell.default_exec_params();

    let run_result = if let Some(command) = &parsed_args.command {
        shell.run_string(command.as_str(), &params).await
    } else if let (Some(script_path), false) = (
        &parsed_args.script_path,
        parsed_args.read_commands_from_stdin,
    ) {
        shell
            .run_script(
                Path::new(script_path),
                parsed_args.script_args.iter().map(|a| a.as_str()),
                &params,
            )
            .await
    } else {
        shell.run_stream(std::io::stdin(), &params).await
    };

    // Run the EXIT trap and restore signal dispositions regardless of how
    // execution ended.
    let exit_result = shell.on_exit(&params).await;

    let result = run_result?;
    exit_result?;

    Ok(result.exit_code)
}
