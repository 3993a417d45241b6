use addon_patcher::jar;
use addon_patcher::Profile;

use clap::{crate_version, value_parser, Arg, Command};
use std::path::PathBuf;
use std::process;

fn main() -> Result<(), jar::Error> {
    env_logger::init();

    let matches = Command::new("Skript addon patcher")
        .version(crate_version!())
        .about("Patch Skript addon jars so they load on newer Skript versions")
        .arg(
            Arg::new("profile")
                .long("profile")
                .value_name("PROFILE")
                .value_parser(value_parser!(Profile))
                .help("Skript API to patch against: `parallel` or `structure`"),
        )
        .arg(
            Arg::new("PATH")
                .help("Addon jar, or a directory of addon jars, to patch in place")
                .required(true)
                .value_parser(value_parser!(PathBuf))
                .index(1),
        )
        .get_matches();

    let profile = matches
        .get_one::<Profile>("profile")
        .copied()
        .unwrap_or_default();
    let path = match matches.get_one::<PathBuf>("PATH") {
        Some(path) => path,
        None => process::exit(2),
    };
    log::info!("Patching '{}' with the {} profile", path.display(), profile);

    if !path.exists() {
        eprintln!("The file {} does not exist", path.display());
        process::exit(1);
    }

    if path.is_dir() {
        let mut any_patched = false;
        for (jar_path, result) in jar::patch_directory(path, profile)? {
            match result {
                Ok(report) if report.changed() => {
                    println!("{} was patched", jar_path.display());
                    any_patched = true;
                }
                Ok(_) => (),
                Err(err) => eprintln!("Failed to patch {}: {}", jar_path.display(), err),
            }
        }
        if !any_patched {
            println!("No addons required patching");
        }
        return Ok(());
    }

    if !jar::is_jar(path) {
        eprintln!("That file isn't a jar file");
        process::exit(1);
    }

    let report = jar::patch_jar_file(path, profile)?;
    if report.changed() {
        println!("{} was patched", path.display());
    } else {
        println!("{} didn't require patching", path.display());
    }
    Ok(())
}
