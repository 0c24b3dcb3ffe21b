/// Rendervm - render a component scenario and replay its update passes
use rendervm::backend::Opcode;
use rendervm::scenario::Scenario;
use std::env;
use std::path::Path;
use std::process;
use tracing_subscriber::EnvFilter;

const VERSION: &str = env!("CARGO_PKG_VERSION");

fn print_usage() {
    eprintln!("Rendervm v{}", VERSION);
    eprintln!();
    eprintln!("USAGE:");
    eprintln!("    rendervm [OPTIONS] <SCENARIO>");
    eprintln!();
    eprintln!("OPTIONS:");
    eprintln!("    -h, --help           Print this help message");
    eprintln!("    -v, --version        Print version information");
    eprintln!("    --dump               Print render and updating opcode dumps");
    eprintln!("    --updates <N>        Run N update passes (default: one per [[update]] step)");
    eprintln!();
    eprintln!("ARGUMENTS:");
    eprintln!("    <SCENARIO>           Scenario TOML file");
    eprintln!();
    eprintln!("ENVIRONMENT:");
    eprintln!("    RUST_LOG             Log filter, e.g. rendervm::vm=trace (default: info)");
    eprintln!();
    eprintln!("EXAMPLES:");
    eprintln!("    rendervm demos/card.toml");
    eprintln!("    rendervm --dump --updates 3 demos/card.toml");
}

fn print_version() {
    println!("Rendervm {}", VERSION);
}

struct Options {
    input: Option<String>,
    dump: bool,
    updates: Option<usize>,
}

fn parse_args() -> Result<Options, String> {
    let args: Vec<String> = env::args().collect();

    let mut input = None;
    let mut dump = false;
    let mut updates = None;
    let mut i = 1;

    while i < args.len() {
        match args[i].as_str() {
            "-h" | "--help" => {
                print_usage();
                process::exit(0);
            }
            "-v" | "--version" => {
                print_version();
                process::exit(0);
            }
            "--dump" => {
                dump = true;
            }
            "--updates" => {
                i += 1;
                let count = args
                    .get(i)
                    .ok_or_else(|| "Missing count after --updates".to_string())?;
                updates = Some(
                    count
                        .parse::<usize>()
                        .map_err(|_| format!("Invalid update count: {}", count))?,
                );
            }
            arg if arg.starts_with('-') => {
                return Err(format!("Unknown option: {}", arg));
            }
            arg => {
                if input.is_some() {
                    return Err("Multiple scenario files specified".to_string());
                }
                input = Some(arg.to_string());
            }
        }
        i += 1;
    }

    Ok(Options {
        input,
        dump,
        updates,
    })
}

fn dump_program(program: &[Opcode]) -> String {
    let mut output = String::new();
    for opcode in program {
        output.push_str(&format!("{}\n", opcode.to_json()));
    }
    output
}

fn run(path: &str, options: &Options) -> Result<(), String> {
    let scenario = Scenario::load(Path::new(path)).map_err(|e| e.to_string())?;
    let compiled = scenario.compile().map_err(|e| e.to_string())?;

    if options.dump {
        print!("== program ==\n{}", dump_program(compiled.program()));
    }

    let mut result = compiled.render().map_err(|e| e.to_string())?;
    println!("{}", result.to_html());

    if options.dump {
        println!("== updating ==");
        for opcode in result.dump_updating() {
            println!("{}", opcode);
        }
    }

    let passes = options.updates.unwrap_or_else(|| compiled.steps());
    for pass in 0..passes {
        compiled.apply_step(pass).map_err(|e| e.to_string())?;
        result
            .rerender()
            .map_err(|e| format!("Update pass {} failed: {}", pass + 1, e))?;
        println!("{}", result.to_html());
    }

    result.destroy();
    let stats = compiled.stats();
    tracing::info!(
        target: "rendervm::cli",
        created = stats.created,
        updated = stats.updated,
        destroyed = stats.destroyed,
        "scenario complete"
    );
    Ok(())
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let options = match parse_args() {
        Ok(opts) => opts,
        Err(e) => {
            eprintln!("Error: {}", e);
            eprintln!();
            print_usage();
            process::exit(1);
        }
    };

    let Some(input) = options.input.as_deref() else {
        eprintln!("Error: Missing scenario file");
        eprintln!();
        print_usage();
        process::exit(1);
    };

    if let Err(e) = run(input, &options) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}
