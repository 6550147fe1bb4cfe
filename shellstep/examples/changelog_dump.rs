//! Dump a remote database's changelog table over SSH.
//!
//! Logs in, switches to the service user, runs `pg_dump` on the
//! `databasechangelog` table and leaves the dump readable in `/tmp` on the
//! remote host.
//!
//! # Prerequisites
//!
//! - SSH server on the target host
//! - A bash login shell whose prompt ends in `"$ "`
//! - `pg_dump` available to the service user
//!
//! # Usage
//!
//! With password authentication:
//! ```bash
//! cargo run --example changelog_dump -- --host db01 --user deploy --password secret \
//!     --service-password wf-secret --db orders --db-user orders_app --file changelog.sql
//! ```
//!
//! With the default SSH key (`~/.ssh/id_rsa`), the password doubles as its
//! passphrase:
//! ```bash
//! cargo run --example changelog_dump -- --host db01 --user deploy --use-key \
//!     --service-password wf-secret --db orders --db-user orders_app --file changelog.sql
//! ```

use std::env;
use std::path::PathBuf;
use std::process;
use std::time::Duration;

use secrecy::SecretString;
use shellstep::ClientBuilder;
use shellstep::recipes::{ChangelogDumpParams, changelog_dump};

#[tokio::main]
async fn main() {
    // Initialize logging (set RUST_LOG=debug for every command sent)
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    if let Err(e) = run(args).await {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

async fn run(args: Args) -> Result<(), shellstep::Error> {
    let mut builder = ClientBuilder::new(&args.host)
        .port(args.port)
        .username(&args.user)
        .timeout(Duration::from_secs(args.timeout));

    builder = match (&args.key, args.use_key, &args.password) {
        (Some(key), _, Some(passphrase)) => builder.private_key_with_passphrase(key, passphrase),
        (Some(key), _, None) => builder.private_key(key),
        (None, true, passphrase) => builder.default_key(passphrase.clone()),
        (None, false, Some(password)) => builder.password(password),
        (None, false, None) => {
            eprintln!("Error: Must provide --password, --key or --use-key");
            process::exit(1);
        }
    };

    let mut client = builder.build()?;

    let params = ChangelogDumpParams {
        service_user: args.service_user,
        service_password: SecretString::from(args.service_password),
        db_name: args.db,
        db_user: args.db_user,
        db_password: args.db_password.map(SecretString::from),
        db_host: args.db_host,
        db_port: args.db_port,
        schema: args.schema,
        remote_dir: "/tmp/".to_string(),
        file_name: args.file,
    };

    println!("Connecting to {}:{}...", args.host, args.port);
    client.connect().await?;
    println!("Connected!");

    println!("\nDumping changelog table to {}", params.dump_path());
    println!("{}", "-".repeat(50));

    let result = client.run_script(&changelog_dump, &params).await;

    // Close before reporting so a failed script still disconnects cleanly
    client.close().await?;

    let report = result?;
    for step in &report.steps {
        println!("[{}] {} ({:?})", step.index, step.description, step.elapsed);
    }

    println!("{}", "-".repeat(50));
    println!("Script completed in {:?}", report.elapsed);
    Ok(())
}

/// Simple argument parser (avoiding external dependencies)
struct Args {
    host: String,
    port: u16,
    user: String,
    password: Option<String>,
    key: Option<PathBuf>,
    use_key: bool,
    timeout: u64,
    service_user: String,
    service_password: String,
    db: String,
    db_user: String,
    db_password: Option<String>,
    db_host: String,
    db_port: u16,
    schema: String,
    file: String,
}

impl Args {
    fn parse() -> Self {
        let args: Vec<String> = env::args().collect();
        let mut parsed = Self {
            host: "localhost".to_string(),
            port: 22,
            user: env::var("USER").unwrap_or_else(|_| "root".to_string()),
            password: None,
            key: None,
            use_key: false,
            timeout: 30,
            service_user: "wildfly".to_string(),
            service_password: String::new(),
            db: String::new(),
            db_user: String::new(),
            db_password: None,
            db_host: "localhost".to_string(),
            db_port: 5432,
            schema: "public".to_string(),
            file: "changelog.sql".to_string(),
        };

        let mut i = 1;
        while i < args.len() {
            let flag = args[i].as_str();
            if flag == "--help" {
                Self::print_help();
                process::exit(0);
            }
            if flag == "--use-key" {
                parsed.use_key = true;
                i += 1;
                continue;
            }

            i += 1;
            let Some(value) = args.get(i).cloned() else {
                eprintln!("Missing value for {}", flag);
                process::exit(1);
            };

            match flag {
                "--host" | "-h" => parsed.host = value,
                "--port" | "-p" => parsed.port = value.parse().unwrap_or(22),
                "--user" | "-u" => parsed.user = value,
                "--password" | "-P" => parsed.password = Some(value),
                "--key" | "-k" => parsed.key = Some(PathBuf::from(value)),
                "--timeout" | "-t" => parsed.timeout = value.parse().unwrap_or(30),
                "--service-user" => parsed.service_user = value,
                "--service-password" => parsed.service_password = value,
                "--db" => parsed.db = value,
                "--db-user" => parsed.db_user = value,
                "--db-password" => parsed.db_password = Some(value).filter(|p| !p.is_empty()),
                "--db-host" => parsed.db_host = value,
                "--db-port" => parsed.db_port = value.parse().unwrap_or(5432),
                "--schema" => parsed.schema = value,
                "--file" => parsed.file = value,
                _ => eprintln!("Unknown argument: {}", flag),
            }
            i += 1;
        }

        parsed
    }

    fn print_help() {
        println!(
            r#"shellstep changelog_dump example

USAGE:
    cargo run --example changelog_dump -- [OPTIONS]

OPTIONS:
    -h, --host <HOST>            Target host [default: localhost]
    -p, --port <PORT>            SSH port [default: 22]
    -u, --user <USER>            Username [default: $USER]
    -P, --password <PASS>        Password, or key passphrase with --key/--use-key
    -k, --key <PATH>             Path to SSH private key
        --use-key                Use ~/.ssh/id_rsa
    -t, --timeout <SECS>         Connection timeout [default: 30]
        --service-user <USER>    User to su to [default: wildfly]
        --service-password <PW>  Password for the service user
        --db <NAME>              Database name
        --db-user <USER>         Database user
        --db-password <PW>       Database password (exported as PGPASSWORD)
        --db-host <HOST>         Database host [default: localhost]
        --db-port <PORT>         Database port [default: 5432]
        --schema <SCHEMA>        Schema of the changelog table [default: public]
        --file <NAME>            Dump file name under /tmp [default: changelog.sql]
    --help                       Print this help message
"#
        );
    }
}
