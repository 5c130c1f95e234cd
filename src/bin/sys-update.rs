// executable wrapper for sys-update

use std::process::exit;
use sys_update::{update, UpdErrorKind};

fn main() {
    match update() {
        Ok(severity) => exit(severity.exit_code()),
        Err(error) => {
            match error.kind() {
                UpdErrorKind::Displayed => {
                    println!("sys-update failed with an error, see messages above");
                }
                _ => {
                    println!("sys-update failed with an error: {}", error);
                }
            }
            exit(1);
        }
    }
}
