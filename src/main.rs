//! Bugpen CLI - project and bug tracking with role-based access control.

use bugpen::cli::{
    AssignCommands, AttachCommands, AuthCommands, BugCommands, Cli, Commands, MarkCommands,
    MemberCommands, ProfileCommands, ProjectCommands, SystemCommands, TagCommands,
};
use bugpen::config::Config;
use bugpen::identity::{self, IdentityError};
use bugpen::models::Role;
use bugpen::ops::bugs::{BugDraft, BugPatch};
use bugpen::ops::users::ProfileUpdate;
use bugpen::ops::{assignments, attachments, bugs, marks, members, projects, tags, users};
use bugpen::storage::Storage;
use bugpen::{audit, Error};
use clap::Parser;
use serde::Serialize;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process;
use std::time::Instant;

fn main() {
    let cli = Cli::parse();
    let human = cli.human_readable;

    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            print_error(&e, human);
            process::exit(1);
        }
    };

    let data_dir = match config.resolve_data_dir(cli.data_dir.clone()) {
        Ok(dir) => dir,
        Err(e) => {
            print_error(&e, human);
            process::exit(1);
        }
    };

    // Serialize command for logging
    let (cmd_name, args_json) = describe_command(&cli.command);

    // Start timing
    let start = Instant::now();

    // Execute command
    let result = run_command(cli.command, &config, cli.principal.clone(), &data_dir, human);

    let duration = start.elapsed().as_millis() as u64;

    let (success, error) = match &result {
        Ok(_) => (true, None),
        Err(e) => (false, Some(e.to_string())),
    };

    // Log the action (best-effort, never fails the command)
    let principal = cli.principal.as_deref().unwrap_or("-");
    audit::log_action(
        &data_dir,
        principal,
        &cmd_name,
        args_json,
        success,
        error,
        duration,
    );

    if let Err(e) = result {
        print_error(&e, human);
        process::exit(1);
    }
}

fn print_error(e: &Error, human: bool) {
    if human {
        eprintln!("Error: {}", e);
    } else {
        eprintln!(
            "{}",
            serde_json::json!({ "error": e.to_string() })
        );
    }
}

/// Print a command result: compact JSON by default, a sentence (or pretty
/// JSON for queries) with -H.
fn emit<T: Serialize>(value: &T, human: bool, message: Option<String>) -> bugpen::Result<()> {
    if human {
        match message {
            Some(msg) => println!("{}", msg),
            None => println!("{}", serde_json::to_string_pretty(value)?),
        }
    } else {
        println!("{}", serde_json::to_string(value)?);
    }
    Ok(())
}

/// Open storage and resolve the authenticated principal to a user record,
/// creating it on first sight.
fn open_session(
    data_dir: &Path,
    config: &Config,
    principal: Option<String>,
) -> bugpen::Result<(Storage, String)> {
    let mut storage = Storage::open_with_data_dir(data_dir)?;
    let principal = config.resolve_principal(principal)?;
    users::find_or_create(&mut storage, &principal)?;
    Ok((storage, principal))
}

fn run_command(
    command: Commands,
    config: &Config,
    principal: Option<String>,
    data_dir: &Path,
    human: bool,
) -> bugpen::Result<()> {
    match command {
        Commands::Whoami => {
            let (storage, principal) = open_session(data_dir, config, principal)?;
            let user = users::whoami(&storage, &principal)?;
            emit(&user, human, None)
        }

        Commands::Auth { command } => match command {
            AuthCommands::Verify { token, issuer } => {
                let issuer = config.resolve_issuer(issuer)?;
                let claims = identity::fetch_claims(&issuer, &token).map_err(|e| match e {
                    IdentityError::Unauthorized => Error::NotAuthenticated,
                    other => Error::Other(other.to_string()),
                })?;

                let mut storage = Storage::open_with_data_dir(data_dir)?;
                users::find_or_create(&mut storage, &claims.sub)?;
                let user = users::update_profile(
                    &mut storage,
                    &claims.sub,
                    ProfileUpdate {
                        name: claims.name,
                        email: claims.email,
                        locale: claims.locale,
                        picture: claims.picture,
                    },
                )?;
                emit(
                    &user,
                    human,
                    Some(format!("Verified token for {}", user.principal)),
                )
            }
        },

        Commands::Profile { command } => match command {
            ProfileCommands::Show { user } => {
                let (storage, principal) = open_session(data_dir, config, principal)?;
                let profile = users::get_profile(&storage, &principal, &user)?;
                emit(&profile, human, None)
            }
            ProfileCommands::Update {
                name,
                email,
                locale,
                picture,
            } => {
                let (mut storage, principal) = open_session(data_dir, config, principal)?;
                let user = users::update_profile(
                    &mut storage,
                    &principal,
                    ProfileUpdate {
                        name,
                        email,
                        locale,
                        picture,
                    },
                )?;
                emit(&user, human, Some(format!("Updated profile of {}", user.short_id)))
            }
            ProfileCommands::Search { text } => {
                let (storage, principal) = open_session(data_dir, config, principal)?;
                let profiles = users::search_profiles(&storage, &principal, &text)?;
                emit(&profiles, human, None)
            }
        },

        Commands::Project { command } => match command {
            ProjectCommands::Create { title, description } => {
                let (mut storage, principal) = open_session(data_dir, config, principal)?;
                let project = projects::create(&mut storage, &principal, &title, description)?;
                emit(
                    &project,
                    human,
                    Some(format!(
                        "Created project {} \"{}\"",
                        project.public_id, project.title
                    )),
                )
            }
            ProjectCommands::List => {
                let (storage, principal) = open_session(data_dir, config, principal)?;
                let summaries = projects::list_my(&storage, &principal)?;
                emit(&summaries, human, None)
            }
            ProjectCommands::Show { project } => {
                let (storage, principal) = open_session(data_dir, config, principal)?;
                let detail = projects::get(&storage, &principal, &project)?;
                emit(&detail, human, None)
            }
            ProjectCommands::Update {
                project,
                title,
                description,
            } => {
                let (mut storage, principal) = open_session(data_dir, config, principal)?;
                let project =
                    projects::update(&mut storage, &principal, &project, title, description)?;
                emit(
                    &project,
                    human,
                    Some(format!("Updated project {}", project.public_id)),
                )
            }
            ProjectCommands::Delete { project } => {
                let (mut storage, principal) = open_session(data_dir, config, principal)?;
                let mut blobs = storage.blob_store()?;
                projects::delete(&mut storage, &mut blobs, &principal, &project)?;
                emit(
                    &serde_json::json!({}),
                    human,
                    Some(format!("Deleted project {}", project)),
                )
            }
        },

        Commands::Member { command } => match command {
            MemberCommands::Add { project, user } => {
                let (mut storage, principal) = open_session(data_dir, config, principal)?;
                let membership = members::add(&mut storage, &principal, &project, &user)?;
                emit(
                    &membership,
                    human,
                    Some(format!("Added {} to {} as spectator", user, project)),
                )
            }
            MemberCommands::Remove { project, user } => {
                let (mut storage, principal) = open_session(data_dir, config, principal)?;
                members::remove(&mut storage, &principal, &project, &user)?;
                emit(
                    &serde_json::json!({}),
                    human,
                    Some(format!("Removed {} from {}", user, project)),
                )
            }
            MemberCommands::Role {
                project,
                user,
                role,
            } => {
                let role: Role = role.parse().map_err(Error::InvalidInput)?;
                let (mut storage, principal) = open_session(data_dir, config, principal)?;
                let membership =
                    members::change_role(&mut storage, &principal, &project, &user, role)?;
                emit(
                    &membership,
                    human,
                    Some(format!("{} is now {} in {}", user, role, project)),
                )
            }
            MemberCommands::List { project } => {
                let (storage, principal) = open_session(data_dir, config, principal)?;
                let memberships = members::list(&storage, &principal, &project)?;
                emit(&memberships, human, None)
            }
        },

        Commands::Bug { command } => match command {
            BugCommands::Report {
                project,
                title,
                description,
                reproducible,
                impact,
                urgency,
            } => {
                let (mut storage, principal) = open_session(data_dir, config, principal)?;
                let bug = bugs::report(
                    &mut storage,
                    &principal,
                    &project,
                    BugDraft {
                        title,
                        description,
                        reproducible,
                        impact,
                        urgency,
                    },
                )?;
                emit(
                    &bug,
                    human,
                    Some(format!("Reported bug #{} \"{}\"", bug.index, bug.title)),
                )
            }
            BugCommands::Show { project, index } => {
                let (storage, principal) = open_session(data_dir, config, principal)?;
                let detail = bugs::get(&storage, &principal, &project, index)?;
                emit(&detail, human, None)
            }
            BugCommands::List { project } => {
                let (storage, principal) = open_session(data_dir, config, principal)?;
                let list = bugs::list(&storage, &principal, &project)?;
                emit(&list, human, None)
            }
            BugCommands::Update {
                project,
                index,
                title,
                description,
                reproducible,
                impact,
                urgency,
            } => {
                let (mut storage, principal) = open_session(data_dir, config, principal)?;
                let bug = bugs::update(
                    &mut storage,
                    &principal,
                    &project,
                    index,
                    BugPatch {
                        title,
                        description,
                        reproducible,
                        impact,
                        urgency,
                    },
                )?;
                emit(&bug, human, Some(format!("Updated bug #{}", bug.index)))
            }
            BugCommands::Delete { project, index } => {
                let (mut storage, principal) = open_session(data_dir, config, principal)?;
                let mut blobs = storage.blob_store()?;
                bugs::delete(&mut storage, &mut blobs, &principal, &project, index)?;
                emit(
                    &serde_json::json!({}),
                    human,
                    Some(format!("Deleted bug #{} from {}", index, project)),
                )
            }
        },

        Commands::Tag { command } => match command {
            TagCommands::Create {
                project,
                title,
                text_color,
                background_color,
                border_color,
            } => {
                let (mut storage, principal) = open_session(data_dir, config, principal)?;
                let tag = tags::create(
                    &mut storage,
                    &principal,
                    &project,
                    &title,
                    &text_color,
                    &background_color,
                    &border_color,
                )?;
                emit(&tag, human, Some(format!("Created tag \"{}\"", tag.title)))
            }
            TagCommands::List { project } => {
                let (storage, principal) = open_session(data_dir, config, principal)?;
                let list = tags::list(&storage, &principal, &project)?;
                emit(&list, human, None)
            }
            TagCommands::Delete { project, tag } => {
                let (mut storage, principal) = open_session(data_dir, config, principal)?;
                tags::delete(&mut storage, &principal, &project, &tag)?;
                emit(
                    &serde_json::json!({}),
                    human,
                    Some(format!("Deleted tag {}", tag)),
                )
            }
        },

        Commands::Mark { command } => match command {
            MarkCommands::Add {
                project,
                index,
                tag,
            } => {
                let (mut storage, principal) = open_session(data_dir, config, principal)?;
                let mark = marks::add(&mut storage, &principal, &project, index, &tag)?;
                emit(&mark, human, Some(format!("Marked bug #{}", index)))
            }
            MarkCommands::Remove {
                project,
                index,
                tag,
            } => {
                let (mut storage, principal) = open_session(data_dir, config, principal)?;
                marks::remove(&mut storage, &principal, &project, index, &tag)?;
                emit(
                    &serde_json::json!({}),
                    human,
                    Some(format!("Unmarked bug #{}", index)),
                )
            }
        },

        Commands::Assign { command } => match command {
            AssignCommands::Add {
                project,
                index,
                user,
            } => {
                let (mut storage, principal) = open_session(data_dir, config, principal)?;
                let assignment =
                    assignments::add(&mut storage, &principal, &project, index, &user)?;
                emit(
                    &assignment,
                    human,
                    Some(format!("Assigned {} to bug #{}", user, index)),
                )
            }
            AssignCommands::Remove {
                project,
                index,
                user,
            } => {
                let (mut storage, principal) = open_session(data_dir, config, principal)?;
                assignments::remove(&mut storage, &principal, &project, index, &user)?;
                emit(
                    &serde_json::json!({}),
                    human,
                    Some(format!("Unassigned {} from bug #{}", user, index)),
                )
            }
        },

        Commands::Attach { command } => match command {
            AttachCommands::Add {
                project,
                index,
                file,
                title,
                content_type,
            } => {
                let bytes = std::fs::read(&file)?;
                let title = title.unwrap_or_else(|| file_title(&file));

                let (mut storage, principal) = open_session(data_dir, config, principal)?;
                let mut blobs = storage.blob_store()?;
                let attachment = attachments::add(
                    &mut storage,
                    &mut blobs,
                    &principal,
                    &project,
                    index,
                    &title,
                    &content_type,
                    &bytes,
                )?;
                emit(
                    &attachment,
                    human,
                    Some(format!(
                        "Attached \"{}\" ({} bytes) to bug #{}",
                        attachment.title, attachment.size, index
                    )),
                )
            }
            AttachCommands::Get {
                project,
                index,
                attachment,
                output,
            } => {
                let (storage, principal) = open_session(data_dir, config, principal)?;
                let blobs = storage.blob_store()?;
                let (meta, bytes) = attachments::get(
                    &storage,
                    &blobs,
                    &principal,
                    &project,
                    index,
                    &attachment,
                )?;
                match output {
                    Some(path) => {
                        std::fs::write(&path, &bytes)?;
                        emit(
                            &meta,
                            human,
                            Some(format!("Wrote \"{}\" to {}", meta.title, path.display())),
                        )
                    }
                    None => {
                        std::io::stdout().write_all(&bytes)?;
                        Ok(())
                    }
                }
            }
            AttachCommands::List { project, index } => {
                let (storage, principal) = open_session(data_dir, config, principal)?;
                let list = attachments::list(&storage, &principal, &project, index)?;
                emit(&list, human, None)
            }
            AttachCommands::Remove {
                project,
                index,
                attachment,
            } => {
                let (mut storage, principal) = open_session(data_dir, config, principal)?;
                let mut blobs = storage.blob_store()?;
                attachments::remove(
                    &mut storage,
                    &mut blobs,
                    &principal,
                    &project,
                    index,
                    &attachment,
                )?;
                emit(
                    &serde_json::json!({}),
                    human,
                    Some(format!("Deleted attachment {}", attachment)),
                )
            }
        },

        Commands::System { command } => match command {
            SystemCommands::Init => {
                let storage = Storage::init_with_data_dir(data_dir)?;
                emit(
                    &serde_json::json!({ "data_dir": storage.root.display().to_string() }),
                    human,
                    Some(format!("Initialized bugpen data in {}", storage.root.display())),
                )
            }
            SystemCommands::Stats => {
                let (storage, principal) = open_session(data_dir, config, principal)?;
                let count = users::memberships_count(&storage, &principal)?;
                emit(
                    &serde_json::json!({ "memberships_count": count }),
                    human,
                    Some(format!("{} memberships across all projects", count)),
                )
            }
        },
    }
}

fn file_title(path: &PathBuf) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "attachment".to_string())
}

/// Serialize a command into a name and argument payload for the action
/// log.
fn describe_command(command: &Commands) -> (String, serde_json::Value) {
    match command {
        Commands::Whoami => ("whoami".to_string(), serde_json::json!({})),
        Commands::Auth { command } => match command {
            AuthCommands::Verify { issuer, .. } => (
                "auth verify".to_string(),
                serde_json::json!({ "issuer": issuer }),
            ),
        },
        Commands::Profile { command } => match command {
            ProfileCommands::Show { user } => (
                "profile show".to_string(),
                serde_json::json!({ "user": user }),
            ),
            ProfileCommands::Update { .. } => ("profile update".to_string(), serde_json::json!({})),
            ProfileCommands::Search { text } => (
                "profile search".to_string(),
                serde_json::json!({ "text": text }),
            ),
        },
        Commands::Project { command } => match command {
            ProjectCommands::Create { title, .. } => (
                "project create".to_string(),
                serde_json::json!({ "title": title }),
            ),
            ProjectCommands::List => ("project list".to_string(), serde_json::json!({})),
            ProjectCommands::Show { project } => (
                "project show".to_string(),
                serde_json::json!({ "project": project }),
            ),
            ProjectCommands::Update { project, .. } => (
                "project update".to_string(),
                serde_json::json!({ "project": project }),
            ),
            ProjectCommands::Delete { project } => (
                "project delete".to_string(),
                serde_json::json!({ "project": project }),
            ),
        },
        Commands::Member { command } => match command {
            MemberCommands::Add { project, user } => (
                "member add".to_string(),
                serde_json::json!({ "project": project, "user": user }),
            ),
            MemberCommands::Remove { project, user } => (
                "member remove".to_string(),
                serde_json::json!({ "project": project, "user": user }),
            ),
            MemberCommands::Role {
                project,
                user,
                role,
            } => (
                "member role".to_string(),
                serde_json::json!({ "project": project, "user": user, "role": role }),
            ),
            MemberCommands::List { project } => (
                "member list".to_string(),
                serde_json::json!({ "project": project }),
            ),
        },
        Commands::Bug { command } => match command {
            BugCommands::Report { project, title, .. } => (
                "bug report".to_string(),
                serde_json::json!({ "project": project, "title": title }),
            ),
            BugCommands::Show { project, index } => (
                "bug show".to_string(),
                serde_json::json!({ "project": project, "index": index }),
            ),
            BugCommands::List { project } => (
                "bug list".to_string(),
                serde_json::json!({ "project": project }),
            ),
            BugCommands::Update { project, index, .. } => (
                "bug update".to_string(),
                serde_json::json!({ "project": project, "index": index }),
            ),
            BugCommands::Delete { project, index } => (
                "bug delete".to_string(),
                serde_json::json!({ "project": project, "index": index }),
            ),
        },
        Commands::Tag { command } => match command {
            TagCommands::Create { project, title, .. } => (
                "tag create".to_string(),
                serde_json::json!({ "project": project, "title": title }),
            ),
            TagCommands::List { project } => (
                "tag list".to_string(),
                serde_json::json!({ "project": project }),
            ),
            TagCommands::Delete { project, tag } => (
                "tag delete".to_string(),
                serde_json::json!({ "project": project, "tag": tag }),
            ),
        },
        Commands::Mark { command } => match command {
            MarkCommands::Add {
                project,
                index,
                tag,
            } => (
                "mark add".to_string(),
                serde_json::json!({ "project": project, "index": index, "tag": tag }),
            ),
            MarkCommands::Remove {
                project,
                index,
                tag,
            } => (
                "mark remove".to_string(),
                serde_json::json!({ "project": project, "index": index, "tag": tag }),
            ),
        },
        Commands::Assign { command } => match command {
            AssignCommands::Add {
                project,
                index,
                user,
            } => (
                "assign add".to_string(),
                serde_json::json!({ "project": project, "index": index, "user": user }),
            ),
            AssignCommands::Remove {
                project,
                index,
                user,
            } => (
                "assign remove".to_string(),
                serde_json::json!({ "project": project, "index": index, "user": user }),
            ),
        },
        Commands::Attach { command } => match command {
            AttachCommands::Add { project, index, .. } => (
                "attach add".to_string(),
                serde_json::json!({ "project": project, "index": index }),
            ),
            AttachCommands::Get {
                project,
                index,
                attachment,
                ..
            } => (
                "attach get".to_string(),
                serde_json::json!({ "project": project, "index": index, "attachment": attachment }),
            ),
            AttachCommands::List { project, index } => (
                "attach list".to_string(),
                serde_json::json!({ "project": project, "index": index }),
            ),
            AttachCommands::Remove {
                project,
                index,
                attachment,
            } => (
                "attach remove".to_string(),
                serde_json::json!({ "project": project, "index": index, "attachment": attachment }),
            ),
        },
        Commands::System { command } => match command {
            SystemCommands::Init => ("system init".to_string(), serde_json::json!({})),
            SystemCommands::Stats => ("system stats".to_string(), serde_json::json!({})),
        },
    }
}
