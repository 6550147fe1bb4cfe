//! Dump a remote database's Liquibase changelog table.
//!
//! Runs as the application's service user, writes the dump to a file on the
//! remote host and opens its permissions so it can be fetched afterwards.
//! Both shell levels (the service user's and the login shell) are exited at
//! the end, which ends the session.

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Deserializer};

use crate::channel::Command;
use crate::script::Script;

/// Parameters for [`changelog_dump`].
#[derive(Debug, Deserialize)]
pub struct ChangelogDumpParams {
    /// User that owns the database client setup.
    #[serde(default = "default_service_user")]
    pub service_user: String,

    /// Password typed at the `su` prompt.
    #[serde(deserialize_with = "secret")]
    pub service_password: SecretString,

    pub db_name: String,
    pub db_user: String,

    /// Exported as `PGPASSWORD` when present.
    #[serde(default, deserialize_with = "optional_secret")]
    pub db_password: Option<SecretString>,

    #[serde(default = "default_db_host")]
    pub db_host: String,

    #[serde(default = "default_db_port")]
    pub db_port: u16,

    #[serde(default = "default_schema")]
    pub schema: String,

    /// Directory on the remote host that receives the dump.
    #[serde(default = "default_remote_dir")]
    pub remote_dir: String,

    /// File name of the dump inside `remote_dir`.
    pub file_name: String,
}

impl ChangelogDumpParams {
    /// Full path of the dump file on the remote host.
    pub fn dump_path(&self) -> String {
        if self.remote_dir.ends_with('/') {
            format!("{}{}", self.remote_dir, self.file_name)
        } else {
            format!("{}/{}", self.remote_dir, self.file_name)
        }
    }

    /// The `pg_dump` invocation, hidden when it carries a password.
    pub fn dump_command(&self) -> Command {
        let dump = format!(
            "pg_dump -U {} -d {} -h {} -p {} -t {}.databasechangelog -O -x -f {}",
            self.db_user,
            self.db_name,
            self.db_host,
            self.db_port,
            self.schema,
            self.dump_path()
        );

        match &self.db_password {
            Some(password) => Command::hidden(format!(
                "export PGPASSWORD='{}';{}",
                password.expose_secret(),
                dump
            )),
            None => Command::new(dump),
        }
    }
}

/// Switch to the service user, dump the changelog table, make the dump
/// readable, then leave both shells.
pub fn changelog_dump(params: &ChangelogDumpParams) -> Script {
    Script::new()
        .switch_user(
            params.service_user.clone(),
            SecretString::from(params.service_password.expose_secret().to_owned()),
        )
        .validate()
        .run(params.dump_command())
        .validate()
        .run(format!("chmod 777 {}", params.dump_path()))
        .validate()
        .exit()
        .exit()
}

fn default_service_user() -> String {
    "wildfly".to_string()
}

fn default_db_host() -> String {
    "localhost".to_string()
}

fn default_db_port() -> u16 {
    5432
}

fn default_schema() -> String {
    "public".to_string()
}

fn default_remote_dir() -> String {
    "/tmp/".to_string()
}

fn secret<'de, D>(deserializer: D) -> Result<SecretString, D::Error>
where
    D: Deserializer<'de>,
{
    String::deserialize(deserializer).map(SecretString::from)
}

fn optional_secret<'de, D>(deserializer: D) -> Result<Option<SecretString>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.filter(|s| !s.is_empty()).map(SecretString::from))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::script::{ScriptRunner, Step};
    use crate::testing::FakeShell;

    fn params(db_password: Option<&str>) -> ChangelogDumpParams {
        let mut json = serde_json::json!({
            "service_password": "wf-pass",
            "db_name": "orders",
            "db_user": "orders_app",
            "db_host": "db01.internal",
            "file_name": "changelog.sql",
        });
        if let Some(password) = db_password {
            json["db_password"] = password.into();
        }
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn test_defaults() {
        let params = params(None);
        assert_eq!(params.service_user, "wildfly");
        assert_eq!(params.db_port, 5432);
        assert_eq!(params.schema, "public");
        assert_eq!(params.dump_path(), "/tmp/changelog.sql");
        assert!(params.db_password.is_none());
    }

    #[test]
    fn test_empty_db_password_is_none() {
        assert!(params(Some("")).db_password.is_none());
    }

    #[test]
    fn test_dump_command_without_password() {
        let cmd = params(None).dump_command();
        assert!(!cmd.is_hidden());
        assert_eq!(
            cmd.text(),
            "pg_dump -U orders_app -d orders -h db01.internal -p 5432 \
             -t public.databasechangelog -O -x -f /tmp/changelog.sql"
        );
    }

    #[test]
    fn test_dump_command_with_password_is_hidden() {
        let cmd = params(Some("pg-secret")).dump_command();
        assert!(cmd.is_hidden());
        assert!(
            cmd.text()
                .starts_with("export PGPASSWORD='pg-secret';pg_dump -U orders_app")
        );
        assert_eq!(cmd.to_string(), "********");
    }

    #[test]
    fn test_step_sequence() {
        let script = changelog_dump(&params(None));
        let steps: Vec<String> = script.steps().iter().map(|s| s.to_string()).collect();
        assert_eq!(steps.len(), 8);
        assert_eq!(steps[0], "switch user to wildfly");
        assert_eq!(steps[1], "validate");
        assert!(steps[2].starts_with("run `pg_dump"));
        assert_eq!(steps[3], "validate");
        assert_eq!(steps[4], "run `chmod 777 /tmp/changelog.sql`");
        assert_eq!(steps[5], "validate");
        assert!(matches!(script.steps()[6], Step::Exit));
        assert!(matches!(script.steps()[7], Step::Exit));
    }

    #[test]
    fn test_debug_hides_secrets() {
        let debug = format!("{:?}", params(Some("pg-secret")));
        assert!(!debug.contains("pg-secret"));
        assert!(!debug.contains("wf-pass"));
    }

    #[tokio::test]
    async fn test_recipe_against_fake_shell() {
        let shell = FakeShell::new().password("wf-pass");
        let history = shell.history();

        let report = tokio::time::timeout(
            Duration::from_secs(5),
            ScriptRunner::default().run(shell, &changelog_dump, &params(Some("pg-secret"))),
        )
        .await
        .unwrap()
        .unwrap();

        assert!(report.session_closed);
        assert_eq!(report.steps[2].responses[0].command, "********");

        let history = history.lock().unwrap();
        assert_eq!(history.len(), 9);
        assert!(history[3].starts_with("export PGPASSWORD='pg-secret';pg_dump"));
        assert_eq!(history[5], "chmod 777 /tmp/changelog.sql");
    }
}
