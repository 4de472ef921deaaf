use clap::Parser;

use travelrag_cli::cli::{Cli, CliRole, Command};
use travelrag_core::Role;

fn query_role(args: &[&str]) -> Result<CliRole, clap::Error> {
    let cli = Cli::try_parse_from(args)?;
    match cli.command {
        Command::Query { role, .. } => Ok(role),
        other => panic!("unexpected command {other:?}"),
    }
}

#[test]
fn role_defaults_to_customer() {
    assert_eq!(query_role(&["travelrag", "query", "When", "is", "checkout?"]).expect("parse"), CliRole::Customer);
}

#[test]
fn owner_role_spellings_are_accepted() {
    for name in ["property-owner", "property_owner", "owner"] {
        let role = query_role(&["travelrag", "query", "--role", name, "How is the pool?"]).expect("parse");
        assert_eq!(Role::from(role), Role::PropertyOwner);
    }
}

#[test]
fn unknown_role_is_rejected() {
    let err = query_role(&["travelrag", "query", "--role", "propertyowner", "How is the pool?"]).expect_err("typo");
    assert_eq!(err.kind(), clap::error::ErrorKind::InvalidValue);
}

#[test]
fn rating_outside_one_to_five_is_rejected() {
    let args = ["travelrag", "add-review", "--user-id", "1", "--hotel-id", "5", "--rating", "6", "Nice"];
    assert!(Cli::try_parse_from(args).is_err());
}
