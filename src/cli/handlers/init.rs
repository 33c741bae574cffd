use std::error::Error;
use std::fs;
use std::path::Path;

use chrono::Utc;

use crate::cli::commands::{ConfigAction, ConfigCmd, InitArgs, LoginArgs, VerifyArgs};
use crate::io::auth::{self, AuthClient};
use crate::io::config_io::{self, KEYS};
use crate::io::store::data_dir;
use crate::model::config::{AppConfig, PersistenceMode, RemoteConfig};
use crate::model::session::{Session, SessionEvent, SessionHub};

pub fn cmd_init(home: &Path, args: InitArgs) -> Result<(), Box<dyn Error>> {
    let mode = PersistenceMode::parse_mode(&args.mode)
        .ok_or_else(|| format!("unknown mode '{}' (expected: local, remote)", args.mode))?;
    let remote = match (mode, args.url.as_deref(), args.key.as_deref()) {
        (_, Some(url), Some(key)) => Some((url, key)),
        (PersistenceMode::Remote, _, _) => {
            return Err("remote mode needs --url and --key".into());
        }
        (PersistenceMode::Local, None, None) => None,
        (PersistenceMode::Local, _, _) => {
            return Err("--url and --key must be given together".into());
        }
    };

    let path = config_io::init_config(home, mode, remote, args.force)?;
    if mode == PersistenceMode::Local {
        let data = data_dir(home);
        fs::create_dir_all(&data).map_err(|e| format!("could not create {}: {}", data.display(), e))?;
    }
    println!("wrote {}", path.display());
    println!("next: tf login <email>");
    Ok(())
}

/// Session hub seeded with the saved session; observers announce changes.
fn session_hub(home: &Path) -> Result<SessionHub, Box<dyn Error>> {
    let mut hub = SessionHub::new(auth::load_session(home)?);
    hub.subscribe(|event| match event {
        SessionEvent::SignedIn(session) => println!("signed in as {}", session.display_name()),
        SessionEvent::SignedOut => println!("signed out"),
    });
    Ok(hub)
}

fn remote_config(config: &AppConfig) -> Result<&RemoteConfig, Box<dyn Error>> {
    config
        .remote
        .as_ref()
        .ok_or_else(|| "remote mode needs [remote] url and api_key in config.toml".into())
}

pub fn cmd_login(home: &Path, config: &AppConfig, args: LoginArgs) -> Result<(), Box<dyn Error>> {
    match config.mode {
        PersistenceMode::Local => {
            let email = auth::validate_email(&args.email)?;
            let session = Session::offline(&email);
            auth::save_session(home, &session)?;
            session_hub(home)?.sign_in(session);
        }
        PersistenceMode::Remote => {
            AuthClient::new(remote_config(config)?)?.send_magic_link(&args.email)?;
            println!("sign-in e-mail sent to {}", args.email.trim());
            println!("next: tf verify {} <code>", args.email.trim());
        }
    }
    Ok(())
}

pub fn cmd_verify(home: &Path, config: &AppConfig, args: VerifyArgs) -> Result<(), Box<dyn Error>> {
    if config.mode == PersistenceMode::Local {
        return Err("verify is only used in remote mode; `tf login` signs in locally".into());
    }
    let client = AuthClient::new(remote_config(config)?)?;
    let session = client.verify(&args.email, &args.code, Utc::now())?;
    auth::save_session(home, &session)?;
    session_hub(home)?.sign_in(session);
    Ok(())
}

pub fn cmd_logout(home: &Path, config: &AppConfig) -> Result<(), Box<dyn Error>> {
    let mut hub = session_hub(home)?;
    let Some(session) = hub.current().cloned() else {
        println!("not signed in");
        return Ok(());
    };
    if config.mode == PersistenceMode::Remote && session.access_token.is_some() {
        let revoked = remote_config(config)
            .and_then(|remote| Ok(AuthClient::new(remote)?))
            .and_then(|client| Ok(client.sign_out(&session)?));
        if let Err(e) = revoked {
            tracing::warn!(error = %e, "could not revoke session; clearing it locally");
        }
    }
    auth::clear_session(home)?;
    hub.sign_out();
    Ok(())
}

pub fn cmd_whoami(home: &Path, config: &AppConfig, json: bool) -> Result<(), Box<dyn Error>> {
    let session = auth::load_session(home)?;
    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "mode": config.mode.as_str(),
                "user": session.as_ref().map(|s| &s.user),
                "expired": session.as_ref().is_some_and(|s| s.is_expired(Utc::now())),
            }))?
        );
        return Ok(());
    }
    match session {
        Some(s) => {
            let expired = if s.is_expired(Utc::now()) { " (expired)" } else { "" };
            println!("{} [{}]{}", s.display_name(), config.mode.as_str(), expired);
        }
        None => println!("not signed in [{}]", config.mode.as_str()),
    }
    Ok(())
}

pub fn cmd_config(home: &Path, args: ConfigCmd, json: bool) -> Result<(), Box<dyn Error>> {
    match args.action {
        ConfigAction::Path => {
            println!("{}", config_io::config_path(home).display());
        }
        ConfigAction::Get(get) => {
            let (config, _) = config_io::read_config(home)?;
            let keys: Vec<&str> = match get.key.as_deref() {
                Some(key) => vec![key],
                None => KEYS.to_vec(),
            };
            let mut values = serde_json::Map::new();
            for key in keys {
                let value = config_io::get_key(&config, key)?;
                if json {
                    values.insert(key.to_string(), serde_json::json!(value));
                } else if get.key.is_some() {
                    println!("{}", value.unwrap_or_default());
                } else if let Some(value) = value {
                    println!("{} = {}", key, value);
                }
            }
            if json {
                println!("{}", serde_json::to_string_pretty(&values)?);
            }
        }
        ConfigAction::Set(set) => {
            let (_, mut doc) = config_io::read_config(home)?;
            config_io::set_key(&mut doc, &set.key, &set.value)?;
            config_io::write_config(home, &doc)?;
            tracing::info!(key = %set.key, "config updated");
            println!("{} = {}", set.key, set.value);
        }
    }
    Ok(())
}
