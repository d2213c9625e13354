//! Integration tests against real child processes.
//!
//! Each test writes small `/bin/sh` scripts that imitate the navencrypt tools
//! into a temporary directory and points the client at them.

#![cfg(unix)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use navexpect::{
    BackendType, BlockingNavencrypt, ExpectError, Failure, Mode, NavConfig, Navencrypt, Passphrase,
    ProcessExitStatus, Registration, SharedBuffer, Sink, TimeoutConfig,
};
use tempfile::TempDir;

const PASSPHRASE: &str = "s3cret-master-passphrase";

/// Fake `navencrypt`. Every call is appended to `calls.log`.
const NAVENCRYPT: &str = r##"#!/bin/sh
echo "$*" >> "$(dirname "$0")/calls.log"
ask() {
    printf 'Type MASTER passphrase: '
    read -r pw
    echo
    if [ "$pw" != "@PASS@" ]; then
        echo "Incorrect key"
        exit 1
    fi
}
case "$1" in
register)
    echo "Choose MASTER key type:"
    echo " 1) Passphrase (single)"
    echo " 2) Passphrase (dual)"
    printf 'Select: '
    read -r choice
    ask
    printf 'Verify MASTER passphrase: '
    read -r again
    echo
    case "$*" in
    *--org=bad*) echo "ERROR: Unable to register organization" >&2; exit 1 ;;
    esac
    echo "navencrypt is now registered."
    ;;
acl)
    case "$2" in
    --list)
        ask
        echo "# - Type  Category  Path  Profile  Process"
        echo "------------------------------------------"
        echo "1   ALLOW @mysql    *     *        /usr/sbin/mysqld"
        echo "2   ALLOW @log      *     *        /usr/sbin/rsyslogd"
        echo
        ;;
    --add) ask; echo "1 rule(s) were added" ;;
    --del) ask; echo "1 rule(s) were deleted" ;;
    esac
    ;;
set)
    ask
    echo "navencrypt is now in ${2#--mode=} mode"
    ;;
esac
"##;

/// Fake `navencrypt-prepare`.
const PREPARE: &str = r#"#!/bin/sh
echo "$*" >> "$(dirname "$0")/calls.log"
if [ "$1" = "--undo-force" ]; then
    printf 'This will remove the encrypted volume. Do you want to continue? [yes/no] '
    read -r first
    [ "$first" = "yes" ] || exit 2
    printf 'Are you sure? [yes/no] '
    read -r second
    [ "$second" = "yes" ] || exit 2
fi
printf 'Type MASTER passphrase: '
read -r pw
echo
echo "Working on $*"
case "$*" in
*/mnt/broken*) echo "mount failed" >&2; exit 5 ;;
esac
exit 0
"#;

/// Fake `navencrypt-move`.
const MOVE: &str = r#"#!/bin/sh
echo "$*" >> "$(dirname "$0")/calls.log"
printf 'Type MASTER passphrase: '
read -r pw
echo
echo "Moving $3 to $4"
echo "Done."
"#;

/// A password check that never answers after the passphrase.
const SILENT: &str = r#"#!/bin/sh
printf 'Type MASTER passphrase: '
read -r pw
exec sleep 30
"#;

/// Closes its input before asking for the key type.
const DEAF: &str = r#"#!/bin/sh
exec 0<&-
echo "Choose MASTER key type:"
printf 'Select: '
sleep 0.2
exit 4
"#;

/// A move that reports a recoverable error before finishing.
const NOISY_MOVE: &str = r#"#!/bin/sh
printf 'Type MASTER passphrase: '
read -r pw
echo
echo "ERROR: could not preserve ownership of $3/tmp"
sleep 0.2
echo "Done."
"#;

/// Rejects the passphrase, then keeps talking before it exits.
const CHATTY_REJECT: &str = r#"#!/bin/sh
printf 'Type MASTER passphrase: '
read -r pw
echo
echo "Incorrect key"
sleep 0.2
echo "Contact your administrator to reset the master key."
exit 1
"#;

/// A `navencrypt set` that only works on a terminal and reads the
/// passphrase from `/dev/tty`.
const TTY_ONLY: &str = r#"#!/bin/sh
if [ ! -t 0 ]; then
    echo "ERROR: stdin is not a terminal"
    exit 1
fi
printf 'Type MASTER passphrase: '
read -r pw </dev/tty
echo
if [ "$pw" != "@PASS@" ]; then
    echo "Incorrect key"
    exit 1
fi
echo "navencrypt is now in ${2#--mode=} mode"
"#;

struct Fixture {
    dir: TempDir,
}

impl Fixture {
    fn new() -> Self {
        let fixture = Self {
            dir: tempfile::tempdir().unwrap(),
        };
        fixture.script("navencrypt", &NAVENCRYPT.replace("@PASS@", PASSPHRASE));
        fixture.script("navencrypt-prepare", PREPARE);
        fixture.script("navencrypt-move", MOVE);
        fixture.script("silent", SILENT);
        fixture.script("deaf", DEAF);
        fixture.script("noisy-move", NOISY_MOVE);
        fixture.script("chatty-reject", CHATTY_REJECT);
        fixture.script("tty-only", &TTY_ONLY.replace("@PASS@", PASSPHRASE));
        fixture
    }

    fn script(&self, name: &str, body: &str) {
        let path = self.path(name);
        fs::write(&path, body).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    fn lock(&self) -> PathBuf {
        self.path(".navencrypt-move.lock")
    }

    fn config(&self) -> NavConfig {
        let mut config = NavConfig::default();
        config.programs.navencrypt = self.path("navencrypt");
        config.programs.prepare = self.path("navencrypt-prepare");
        config.programs.mover = self.path("navencrypt-move");
        config.timeouts = TimeoutConfig::uniform(Duration::from_secs(10));
        config.encrypt.lock_file = self.lock();
        config.encrypt.lock_release_delay = Duration::from_millis(10);
        config
    }

    fn client(&self) -> Navencrypt {
        Navencrypt::new(self.config()).unwrap()
    }

    fn calls(&self) -> Vec<String> {
        fs::read_to_string(self.path("calls.log"))
            .unwrap_or_default()
            .lines()
            .map(str::to_string)
            .collect()
    }
}

fn passphrase() -> Passphrase {
    Passphrase::new(PASSPHRASE).unwrap()
}

#[tokio::test]
async fn check_password_against_script() {
    let fixture = Fixture::new();
    let nav = fixture.client();

    let accepted = nav.check_password(&passphrase(), &Sink::null()).await.unwrap();
    assert!(accepted.success, "{accepted}");
    assert_eq!(accepted.exit_status, Some(ProcessExitStatus::Exited(0)));

    let wrong = Passphrase::new("not-the-passphrase").unwrap();
    let rejected = nav.check_password(&wrong, &Sink::null()).await.unwrap();
    assert!(!rejected.success);
    assert!(matches!(rejected.failure, Some(Failure::Rejected { .. })));
    assert_eq!(fixture.calls(), vec!["acl --list", "acl --list"]);
}

#[tokio::test]
async fn check_password_silence_is_accepted_and_child_killed() {
    let fixture = Fixture::new();
    let mut config = fixture.config();
    config.programs.navencrypt = fixture.path("silent");
    config.timeouts.prompt = Duration::from_millis(300);
    let nav = Navencrypt::new(config).unwrap();

    let outcome = nav.check_password(&passphrase(), &Sink::null()).await.unwrap();
    assert!(outcome.success, "{outcome}");
    assert!(matches!(outcome.exit_status, Some(ProcessExitStatus::Signaled(_))));
}

#[tokio::test]
async fn check_password_rejection_with_trailing_output() {
    let fixture = Fixture::new();
    let mut config = fixture.config();
    config.programs.navencrypt = fixture.path("chatty-reject");
    let nav = Navencrypt::new(config).unwrap();

    let outcome = nav.check_password(&passphrase(), &Sink::null()).await.unwrap();
    assert_eq!(
        outcome.failure,
        Some(Failure::Rejected {
            message: "Incorrect key".into()
        })
    );
    assert_eq!(outcome.exit_status, Some(ProcessExitStatus::Exited(1)));
    assert!(outcome.transcript.contains("Contact your administrator"));
}

#[tokio::test]
async fn register_against_script() {
    let fixture = Fixture::new();
    let nav = fixture.client();
    let buffer = SharedBuffer::new();

    let reg = Registration::new("kts.example.com", 11371, "acme", "auth-token", "node01");
    let outcome = nav
        .register(&reg, &passphrase(), &Sink::buffer(&buffer))
        .await
        .unwrap();
    assert!(outcome.success, "{outcome}");
    assert!(buffer.to_string_lossy().contains("navencrypt is now registered."));
    assert!(!buffer.to_string_lossy().contains(PASSPHRASE));
    assert_eq!(
        fixture.calls(),
        vec![
            "register --server=kts.example.com:11371 --org=acme --auth=auth-token \
             --clientname=node01 --skip-ssl-check"
        ]
    );
}

#[tokio::test]
async fn register_error_on_stderr_is_rejection() {
    let fixture = Fixture::new();
    let nav = fixture.client();

    let reg = Registration::new("kts.example.com", 11371, "bad", "auth-token", "node01");
    let outcome = nav.register(&reg, &passphrase(), &Sink::null()).await.unwrap();
    match outcome.failure {
        Some(Failure::Rejected { message }) => {
            assert_eq!(message, "ERROR: Unable to register organization");
        }
        other => panic!("unexpected failure: {other:?}"),
    }
}

#[tokio::test]
async fn register_child_without_stdin_reports_status() {
    let fixture = Fixture::new();
    let mut config = fixture.config();
    config.programs.navencrypt = fixture.path("deaf");
    let nav = Navencrypt::new(config).unwrap();

    let reg = Registration::new("kts.example.com", 11371, "acme", "auth-token", "node01");
    let outcome = nav.register(&reg, &passphrase(), &Sink::null()).await.unwrap();
    assert!(
        matches!(outcome.failure, Some(Failure::InputClosed { .. })),
        "{outcome}"
    );
    assert_eq!(outcome.exit_status, Some(ProcessExitStatus::Exited(4)));
}

#[tokio::test]
async fn prepare_volume_follows_exit_status() {
    let fixture = Fixture::new();
    let nav = fixture.client();

    let ok = nav
        .prepare_volume(
            Path::new("/var/lib/enc/storage"),
            Path::new("/dev/sdb"),
            Path::new("/mnt/enc"),
            &passphrase(),
            &Sink::null(),
        )
        .await
        .unwrap();
    assert!(ok.success, "{ok}");

    let broken = nav
        .prepare_volume(
            Path::new("/var/lib/enc/storage"),
            Path::new("/dev/sdc"),
            Path::new("/mnt/broken"),
            &passphrase(),
            &Sink::null(),
        )
        .await
        .unwrap();
    assert_eq!(
        broken.failure,
        Some(Failure::ExitStatus(ProcessExitStatus::Exited(5)))
    );
    assert!(broken.transcript.contains("mount failed"));
}

#[tokio::test]
async fn teardown_volume_against_script() {
    let fixture = Fixture::new();
    let nav = fixture.client();

    let outcome = nav
        .teardown_volume(Path::new("/mnt/enc"), &passphrase(), &Sink::null())
        .await
        .unwrap();
    assert!(outcome.success, "{outcome}");
    assert_eq!(fixture.calls(), vec!["--undo-force /mnt/enc"]);
}

#[tokio::test]
async fn encrypt_directory_removes_lock() {
    let fixture = Fixture::new();
    fs::write(fixture.lock(), b"1234").unwrap();
    let nav = fixture.client();

    let outcome = nav
        .encrypt_directory(
            "@mysql",
            Path::new("/var/lib/mysql"),
            Path::new("/mnt/enc"),
            &passphrase(),
            &Sink::null(),
        )
        .await
        .unwrap();
    assert!(outcome.success, "{outcome}");
    assert!(!fixture.lock().exists());
    assert_eq!(fixture.calls(), vec!["encrypt @mysql /var/lib/mysql /mnt/enc"]);
}

#[tokio::test]
async fn encrypt_directory_waits_past_error_line() {
    let fixture = Fixture::new();
    fs::write(fixture.lock(), b"1234").unwrap();
    let mut config = fixture.config();
    config.programs.mover = fixture.path("noisy-move");
    let nav = Navencrypt::new(config).unwrap();

    let outcome = nav
        .encrypt_directory(
            "@mysql",
            Path::new("/var/lib/mysql"),
            Path::new("/mnt/enc"),
            &passphrase(),
            &Sink::null(),
        )
        .await
        .unwrap();
    assert!(outcome.success, "{outcome}");
    assert!(outcome.transcript.contains("ERROR: could not preserve ownership"));
    assert!(!fixture.lock().exists());
}

#[tokio::test]
async fn rules_round_trip_against_script() {
    let fixture = Fixture::new();
    let nav = fixture.client();

    let added = nav
        .add_rule("ALLOW @log * /usr/sbin/rsyslogd", &passphrase(), &Sink::null())
        .await
        .unwrap();
    assert!(added.success, "{added}");

    let listing = nav.list_rules(&passphrase(), &Sink::null()).await.unwrap();
    assert!(listing.outcome.success, "{}", listing.outcome);
    assert_eq!(listing.rules.len(), 2);

    let deleted = nav
        .delete_rule("ALLOW @log * * /usr/sbin/rsyslogd", &passphrase(), &Sink::null())
        .await
        .unwrap();
    assert!(deleted.success, "{deleted}");

    let missing = nav
        .delete_rule("ALLOW @web * * /usr/sbin/httpd", &passphrase(), &Sink::null())
        .await
        .unwrap();
    assert!(matches!(missing.failure, Some(Failure::RuleNotFound { .. })));

    assert_eq!(
        fixture.calls(),
        vec![
            "acl --add --rule=ALLOW @log * /usr/sbin/rsyslogd",
            "acl --list",
            "acl --list",
            "acl --del --line=2",
            "acl --list",
        ]
    );
}

#[tokio::test]
async fn set_mode_against_script() {
    let fixture = Fixture::new();
    let nav = fixture.client();

    for mode in [Mode::Enforcing, Mode::Permissive] {
        let outcome = nav.set_mode(mode, &passphrase(), &Sink::null()).await.unwrap();
        assert!(outcome.success, "{outcome}");
    }
    assert_eq!(fixture.calls(), vec!["set --mode=enforcing", "set --mode=permissive"]);
}

#[tokio::test]
async fn pty_backend_drives_terminal_only_tool() {
    let fixture = Fixture::new();
    let mut config = fixture.config();
    config.programs.navencrypt = fixture.path("tty-only");

    let piped = Navencrypt::new(config.clone()).unwrap();
    let refused = piped.set_mode(Mode::Enforcing, &passphrase(), &Sink::null()).await.unwrap();
    assert!(!refused.success);
    assert!(refused.transcript.contains("not a terminal"));

    config.backend = BackendType::Pty;
    let nav = Navencrypt::new(config).unwrap();
    let buffer = SharedBuffer::new();
    let outcome = nav
        .set_mode(Mode::Enforcing, &passphrase(), &Sink::buffer(&buffer))
        .await
        .unwrap();
    assert!(outcome.success, "{outcome}");
    assert_eq!(outcome.exit_status, Some(ProcessExitStatus::Exited(0)));
    assert!(buffer.to_string_lossy().contains("navencrypt is now in enforcing mode"));
    assert!(!outcome.transcript.contains(PASSPHRASE));

    let wrong = Passphrase::new("nope").unwrap();
    let rejected = nav.check_password(&wrong, &Sink::null()).await.unwrap();
    assert!(!rejected.success);
}

#[tokio::test]
async fn missing_executable_is_spawn_error() {
    let fixture = Fixture::new();
    let mut config = fixture.config();
    config.programs.navencrypt = fixture.path("does-not-exist");
    let nav = Navencrypt::new(config).unwrap();

    let err = nav.check_password(&passphrase(), &Sink::null()).await.unwrap_err();
    assert!(err.is_spawn(), "{err}");
}

#[test]
fn blocking_client_against_script() {
    let fixture = Fixture::new();
    let nav = BlockingNavencrypt::new(fixture.config()).unwrap();

    let outcome = nav.set_mode(Mode::Permissive, &passphrase(), &Sink::null()).unwrap();
    assert!(outcome.success, "{outcome}");

    let wrong = Passphrase::new("nope").unwrap();
    let rejected = nav.check_password(&wrong, &Sink::null()).unwrap();
    assert!(!rejected.success);
}

#[test]
fn bad_config_is_rejected_before_spawning() {
    let mut config = NavConfig::default();
    config.prompts.done = navexpect::PatternSpec::regex("(unclosed");
    let err = Navencrypt::new(config).unwrap_err();
    assert!(matches!(err, ExpectError::Config { .. }));
}
