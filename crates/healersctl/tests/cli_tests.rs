//! Argument parsing for healersctl

use clap::Parser;
use healers_common::dispatch::Variant;
use healersctl::cli::{Cli, Commands};
use healersctl::shell::Action;
use std::path::PathBuf;

fn parse(args: &[&str]) -> Result<Cli, clap::Error> {
    Cli::try_parse_from(std::iter::once("healersctl").chain(args.iter().copied()))
}

#[test]
fn test_sos_variant_is_optional() {
    let cli = parse(&["sos"]).unwrap();
    assert_eq!(cli.command, Commands::Sos { variant: None });

    let cli = parse(&["sos", "--variant", "vitals"]).unwrap();
    assert_eq!(
        cli.command,
        Commands::Sos {
            variant: Some(Variant::Vitals)
        }
    );

    assert!(parse(&["sos", "--variant", "modal"]).is_err());
}

#[test]
fn test_predict_defaults_to_standard_fleet() {
    let cli = parse(&["predict", "--scenario", "Truck fire at KM 88, two injured"]).unwrap();
    assert_eq!(
        cli.command,
        Commands::Predict {
            scenario: "Truck fire at KM 88, two injured".to_string(),
            ambulances: 5,
            drones: 10,
            doctors: 8,
        }
    );
    assert!(parse(&["predict", "--scenario", "x", "--drones", "-1"]).is_err());
}

#[test]
fn test_global_config_flag() {
    let cli = parse(&["first-aid", "Cut on the arm", "--config", "/tmp/h.toml"]).unwrap();
    assert_eq!(cli.config, Some(PathBuf::from("/tmp/h.toml")));
    assert_eq!(cli.command.name(), "first-aid");
}

#[test]
fn test_sms_requires_recipient_and_message() {
    assert!(parse(&["sms", "--to", "+919876543210"]).is_err());
    let cli = parse(&["sms", "--to", "+919876543210", "--message", "On my way"]).unwrap();
    assert_eq!(cli.command.name(), "sms");
}

#[test]
fn test_medicine_and_map_flags() {
    let cli = parse(&["medicine", "gauze"]).unwrap();
    assert_eq!(
        cli.command,
        Commands::Medicine {
            search: Some("gauze".to_string()),
            preorder: None,
            yes: false,
        }
    );

    let cli = parse(&["medicine", "--preorder", "NHAI Highway Stop", "-y"]).unwrap();
    assert!(matches!(cli.command, Commands::Medicine { yes: true, .. }));

    let cli = parse(&["map", "--locate"]).unwrap();
    assert_eq!(cli.command, Commands::Map { locate: true });
}

#[test]
fn test_shell_actions() {
    assert_eq!(Action::parse("  QUIT "), Action::Quit);
    assert_eq!(Action::parse(""), Action::Continue);
    assert_eq!(Action::parse("skip"), Action::Skip);
    assert_eq!(
        Action::parse(" +919876543210 "),
        Action::Text("+919876543210".to_string())
    );
}
