use std::io::{self, BufRead, Write};

use anyhow::{anyhow, bail, Context, Result};
use tracing::warn;

use persian_admin_core::auth::{ExtendOutcome, TimerExit};
use persian_admin_core::utils::{format_remaining, format_timestamp_millis, truncate_string};
use persian_admin_core::{AuthService, Config, Role, UserProfile};

/// Names longer than this are shortened in `status`
const MAX_NAME_DISPLAY: usize = 40;

/// Printed after sign-up; the CLI keeps accounts in memory
const SIGNUP_NOTE: &str = "Note: this account exists for this run only. \
The cached session stays valid until it expires or you log out.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Login { email: Option<String> },
    Signup { email: String, name: String },
    Logout,
    Status { json: bool },
    Extend,
    Watch,
}

impl Command {
    pub fn parse(args: &[String]) -> Result<Self> {
        let (name, rest) = args
            .split_first()
            .ok_or_else(|| anyhow!("Missing command"))?;
        let command = match (name.as_str(), rest) {
            ("login", []) => Command::Login { email: None },
            ("login", [email]) => Command::Login {
                email: Some(email.clone()),
            },
            ("signup", [email, name @ ..]) if !name.is_empty() => Command::Signup {
                email: email.clone(),
                name: name.join(" "),
            },
            ("logout", []) => Command::Logout,
            ("status", []) => Command::Status { json: false },
            ("status", [flag]) if flag == "--json" => Command::Status { json: true },
            ("extend", []) => Command::Extend,
            ("watch", []) => Command::Watch,
            _ => bail!("Unrecognized arguments: {}", args.join(" ")),
        };
        Ok(command)
    }
}

pub async fn run(command: Command, auth: &AuthService, config: &mut Config) -> Result<()> {
    match command {
        Command::Login { email } => login(auth, config, email).await,
        Command::Signup { email, name } => signup(auth, config, &email, &name).await,
        Command::Logout => logout(auth).await,
        Command::Status { json } => status(auth, json),
        Command::Extend => extend(auth).await,
        Command::Watch => watch(auth).await,
    }
}

async fn login(auth: &AuthService, config: &mut Config, email: Option<String>) -> Result<()> {
    let email = match email {
        Some(email) => email,
        None => prompt_email(config.last_email.as_deref())?,
    };
    let password = rpassword::prompt_password("Password: ")?;

    let profile = auth
        .sign_in(&email, &password)
        .await
        .context("Sign-in failed")?;
    remember_email(config, &email);

    print_welcome(auth, &profile);
    Ok(())
}

async fn signup(auth: &AuthService, config: &mut Config, email: &str, name: &str) -> Result<()> {
    let password = rpassword::prompt_password("Choose a password: ")?;
    let confirm = rpassword::prompt_password("Repeat password: ")?;
    if password != confirm {
        bail!("Passwords do not match");
    }

    let profile = auth
        .sign_up(email, &password, name, None)
        .await
        .context("Sign-up failed")?;
    remember_email(config, email);

    print_welcome(auth, &profile);
    println!("{}", SIGNUP_NOTE);
    Ok(())
}

async fn logout(auth: &AuthService) -> Result<()> {
    auth.logout().await.context("Logout did not complete")?;
    println!("Signed out.");
    Ok(())
}

fn status(auth: &AuthService, json: bool) -> Result<()> {
    let Some(record) = auth.sessions().current_record() else {
        if json {
            println!("null");
        } else {
            println!("Not signed in.");
        }
        return Ok(());
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&record)?);
        return Ok(());
    }

    let user = &record.user;
    println!("Signed in as {}", truncate_string(&user.name, MAX_NAME_DISPLAY));
    println!("  Email:   {}", user.email);
    println!("  Role:    {}", user.role.display_name());
    println!("  Since:   {}", format_timestamp_millis(record.timestamp));
    println!("  Expires: {}", format_timestamp_millis(record.expires_at));
    println!(
        "  Left:    {} ({} h)",
        format_remaining(auth.sessions().remaining()),
        auth.sessions().remaining_hours()
    );
    Ok(())
}

async fn extend(auth: &AuthService) -> Result<()> {
    auth.restore().await?;
    match auth.extend_session()? {
        ExtendOutcome::Extended => {
            println!(
                "Session extended: {} hours left.",
                auth.state().session_hours
            );
            Ok(())
        }
        ExtendOutcome::NoSession => bail!("No active session to extend"),
    }
}

async fn watch(auth: &AuthService) -> Result<()> {
    let Some(profile) = auth.restore().await? else {
        bail!("Not signed in");
    };
    println!(
        "Watching session for {} ({} hours left). Press Ctrl-C to stop.",
        profile.email,
        auth.state().session_hours
    );

    let poll = auth.sessions().settings().poll_interval;
    let timer = auth.start_expiry_watch()?;
    let expired = timer.wait();
    tokio::pin!(expired);

    let mut ticker = tokio::time::interval(poll);
    ticker.tick().await;
    let mut last_hours = auth.state().session_hours;

    loop {
        tokio::select! {
            exit = &mut expired => {
                if exit == TimerExit::Expired {
                    println!("Session expired. Please sign in again.");
                }
                return Ok(());
            }
            _ = ticker.tick() => {
                let hours = auth.refresh_session_time();
                if hours != last_hours {
                    println!("{} hours left.", hours);
                    last_hours = hours;
                }
            }
            result = tokio::signal::ctrl_c() => {
                if let Err(e) = result {
                    warn!(error = %e, "Failed to listen for Ctrl-C");
                }
                return Ok(());
            }
        }
    }
}

fn print_welcome(auth: &AuthService, profile: &UserProfile) {
    println!(
        "Welcome, {} ({}). Session valid for {} hours.",
        profile.name,
        profile.role.display_name(),
        auth.state().session_hours
    );
    if profile.role == Role::Admin {
        println!("Administrator access granted.");
    }
}

fn prompt_email(last: Option<&str>) -> Result<String> {
    match last {
        Some(last) => print!("Email [{}]: ", last),
        None => print!("Email: "),
    }
    io::stdout().flush()?;

    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    let line = line.trim();
    match (line.is_empty(), last) {
        (false, _) => Ok(line.to_string()),
        (true, Some(last)) => Ok(last.to_string()),
        (true, None) => bail!("Email required"),
    }
}

fn remember_email(config: &mut Config, email: &str) {
    config.last_email = Some(email.to_string());
    if let Err(e) = config.save() {
        warn!(error = %e, "Failed to save config");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_commands() {
        assert_eq!(
            Command::parse(&args(&["login"])).unwrap(),
            Command::Login { email: None }
        );
        assert_eq!(
            Command::parse(&args(&["login", "a@example.com"])).unwrap(),
            Command::Login {
                email: Some("a@example.com".to_string())
            }
        );
        assert_eq!(
            Command::parse(&args(&["signup", "a@example.com", "سارا", "احمدی"])).unwrap(),
            Command::Signup {
                email: "a@example.com".to_string(),
                name: "سارا احمدی".to_string()
            }
        );
        assert_eq!(
            Command::parse(&args(&["status", "--json"])).unwrap(),
            Command::Status { json: true }
        );
        assert_eq!(Command::parse(&args(&["watch"])).unwrap(), Command::Watch);
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        assert!(Command::parse(&[]).is_err());
        assert!(Command::parse(&args(&["signup", "a@example.com"])).is_err());
        assert!(Command::parse(&args(&["logout", "now"])).is_err());
        assert!(Command::parse(&args(&["dance"])).is_err());
    }
}
