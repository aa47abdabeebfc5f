/// Display version information
pub fn execute() {
    println!("quarantine {}", env!("CARGO_PKG_VERSION"));
    println!("Operator CLI for the group quarantine bot");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_execute() {
        execute();
    }
}
