#[cfg(test)]
mod tests {
    use crate::cli::{Cli, Command};
    use clap::Parser;
    use std::path::PathBuf;

    #[test]
    fn test_dev_with_command_after_separator() {
        let cli = Cli::try_parse_from([
            "kiln",
            "dev",
            "-a",
            "target/app.wasm",
            "-w",
            "src",
            "-w",
            "Cargo.toml",
            "--",
            "cargo",
            "build",
            "--target",
            "wasm32-wasip1",
        ])
        .unwrap();

        let Command::Dev(args) = cli.command else {
            panic!("expected dev command");
        };
        assert_eq!(args.serve.artifact, Some(PathBuf::from("target/app.wasm")));
        assert_eq!(
            args.watch.watch,
            vec![PathBuf::from("src"), PathBuf::from("Cargo.toml")]
        );
        assert_eq!(
            args.build.command,
            vec!["cargo", "build", "--target", "wasm32-wasip1"]
        );
    }

    #[test]
    fn test_dev_with_pipes() {
        let cli = Cli::try_parse_from([
            "kiln",
            "dev",
            "--request-pipe",
            "/tmp/req",
            "--response-pipe",
            "/tmp/resp",
        ])
        .unwrap();

        let Command::Dev(args) = cli.command else {
            panic!("expected dev command");
        };
        assert_eq!(args.build.request_pipe, Some(PathBuf::from("/tmp/req")));
        assert_eq!(args.build.response_pipe, Some(PathBuf::from("/tmp/resp")));
    }

    #[test]
    fn test_pipes_must_come_in_pairs() {
        assert!(Cli::try_parse_from(["kiln", "dev", "--request-pipe", "/tmp/req"]).is_err());
    }

    #[test]
    fn test_pipes_conflict_with_command() {
        let result = Cli::try_parse_from([
            "kiln",
            "dev",
            "--request-pipe",
            "/tmp/req",
            "--response-pipe",
            "/tmp/resp",
            "--",
            "make",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["kiln", "test", "--verbose", "-c", "ci.toml", "-p", "0"])
            .unwrap();
        assert!(cli.verbose);
        assert_eq!(cli.config, Some(PathBuf::from("ci.toml")));

        let Command::Test(args) = cli.command else {
            panic!("expected test command");
        };
        assert_eq!(args.serve.port, Some(0));
    }

    #[test]
    fn test_verbose_conflicts_with_quiet() {
        assert!(Cli::try_parse_from(["kiln", "-v", "-q", "dev"]).is_err());
    }

    #[test]
    fn test_cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
