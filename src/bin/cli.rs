use std::io::{self, Write};

use chrono::{Datelike, NaiveDate};
use music_flow::persistence::{
    load_store_from_json, load_tasks_from_csv, save_store_to_json, save_tasks_to_csv,
};
use music_flow::recurrence::{self, WeekdaySet, WeeklyRepeat};
use music_flow::{
    AppConfig, AppContext, Feedback, LinkState, Material, MaterialKind, Task, TaskEditError,
    TaskPatch, TaskTemplate, User,
};
use tracing_subscriber::EnvFilter;

fn push_row<'a>(out: &mut String, widths: &[usize], cells: impl Iterator<Item = &'a str>) {
    out.push('|');
    for (ci, cell) in cells.enumerate() {
        out.push(' ');
        out.push_str(cell);
        let pad = widths[ci].saturating_sub(cell.chars().count());
        if pad > 0 {
            out.push_str(&" ".repeat(pad));
        }
        out.push(' ');
        out.push('|');
    }
    out.push('\n');
}

fn render_table(headers: &[&str], rows: &[Vec<String>]) -> String {
    // Column widths in characters, not bytes.
    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    for row in rows {
        for (ci, cell) in row.iter().enumerate() {
            let len = cell.chars().count();
            if len > widths[ci] {
                widths[ci] = len;
            }
        }
    }

    let mut sep = String::new();
    sep.push('+');
    for w in &widths {
        sep.push_str(&"-".repeat(*w + 2));
        sep.push('+');
    }

    let mut out = String::new();
    out.push_str(&sep);
    out.push('\n');
    push_row(&mut out, &widths, headers.iter().copied());
    out.push_str(&sep);
    out.push('\n');
    for row in rows {
        push_row(&mut out, &widths, row.iter().map(String::as_str));
    }
    out.push_str(&sep);
    out.push('\n');
    out
}

fn render_tasks(tasks: &[&Task]) -> String {
    let rows: Vec<Vec<String>> = tasks
        .iter()
        .map(|t| {
            vec![
                t.id.clone(),
                t.date.format("%Y-%m-%d").to_string(),
                t.status.to_string(),
                t.duration_minutes.to_string(),
                t.title.clone(),
                t.feedback
                    .as_ref()
                    .map(|f| f.rating.to_string())
                    .unwrap_or_default(),
                t.materials.len().to_string(),
            ]
        })
        .collect();
    render_table(
        &["id", "date", "status", "minutes", "title", "rating", "materials"],
        &rows,
    )
}

fn render_users(users: &[&User]) -> String {
    let rows: Vec<Vec<String>> = users
        .iter()
        .map(|u| {
            vec![
                u.id.clone(),
                u.name.clone(),
                u.email.clone(),
                u.role.to_string(),
                u.teacher_id.clone().unwrap_or_default(),
                u.invite_code.clone().unwrap_or_default(),
            ]
        })
        .collect();
    render_table(
        &["id", "name", "email", "role", "teacher", "invite_code"],
        &rows,
    )
}

fn render_files(files: &[&Material]) -> String {
    let rows: Vec<Vec<String>> = files
        .iter()
        .map(|f| {
            vec![
                f.id.clone(),
                f.title.clone(),
                f.kind.to_string(),
                f.url.clone(),
                f.uploaded_by.clone().unwrap_or_default(),
            ]
        })
        .collect();
    render_table(&["id", "title", "type", "url", "uploaded_by"], &rows)
}

fn print_help() {
    println!(
        "Commands:\n  help                               Show this help\n  whoami                             Show the signed-in user\n  login <email>                      Sign in\n  logout                             Sign out\n  users                              List all users\n  tasks [student_id]                 List sessions (own by default)\n  week [YYYY-MM-DD] [student_id]     Daily progress for the week containing the date\n  add <YYYY-MM-DD> <minutes> <title...>\n                                     Plan one session for yourself\n  assign <student_id> <YYYY-MM-DD> <minutes> <title...>\n                                     Plan one session for a linked student\n  repeat <start> <until> <weekdays> <minutes> <title...>\n                                     Plan weekly sessions (weekdays like 1,3 or mon,wed)\n  done <id> [rating] [comment...]    Complete a session (no rating = skipped)\n  undo <id>                          Reopen a session\n  toggle <id>                        Flip TODO/DONE\n  delete <id>                        Delete a session\n  title <id> <text...>               Set title\n  date <id> <YYYY-MM-DD>             Set date\n  duration <id> <minutes>            Set duration\n  objective <id> <text...>           Set objective\n  attach <id> <url>                  Attach a link to a session\n  files [query...]                   Search the library\n  upload <pdf|link> <url> <title...> Add a library file\n  students [query...]                Your linked students (teachers)\n  link <invite_code>                 Link to a teacher (students)\n  unlink                             Remove your teacher link\n  save json <path>                   Write the store snapshot\n  load json <path>                   Replace the store from a snapshot\n  export csv <path>                  Write all sessions as CSV\n  import csv <path>                  Add sessions from CSV (known ids skipped)\n  quit|exit                          Exit"
    );
}

fn parse_date(s: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|_| "Invalid date (YYYY-MM-DD)".to_string())
}

fn parse_minutes(s: &str) -> Result<u32, String> {
    match s.parse::<u32>() {
        Ok(0) | Err(_) => Err("Invalid minutes (positive integer)".to_string()),
        Ok(v) => Ok(v),
    }
}

fn signed_in(ctx: &AppContext) -> Result<User, String> {
    ctx.current_user()
        .cloned()
        .ok_or_else(|| "Not signed in. Use 'login <email>'.".to_string())
}

fn managed_task(ctx: &AppContext, task_id: &str) -> Result<(), String> {
    signed_in(ctx)?;
    let task = ctx
        .store()
        .find_task(task_id)
        .ok_or_else(|| format!("Task {task_id} not found."))?;
    if !ctx.can_manage(task) {
        return Err(format!("Task {task_id} belongs to another student."));
    }
    Ok(())
}

fn plan(
    ctx: &mut AppContext,
    student_id: Option<&str>,
    start: NaiveDate,
    minutes: u32,
    title: String,
    repeat: Option<WeeklyRepeat>,
) -> Result<Vec<String>, String> {
    let user = signed_in(ctx)?;
    let student_id = student_id.unwrap_or(&user.id).to_string();
    if title.trim().is_empty() {
        return Err("Title must not be empty.".to_string());
    }
    if !ctx.can_plan_for(&student_id) {
        return Err(format!("Cannot plan sessions for {student_id}."));
    }
    let template = TaskTemplate {
        student_id,
        created_by_user_id: user.id,
        title,
        duration_minutes: minutes,
        objective: String::new(),
        materials: Vec::new(),
    };
    let ids = ctx.plan_sessions(&template, start, repeat.as_ref());
    ctx.commit_best_effort();
    Ok(ids)
}

fn patch_task(ctx: &mut AppContext, task_id: &str, patch: TaskPatch) -> Result<String, String> {
    managed_task(ctx, task_id)?;
    let task = match ctx.store_mut().edit_task(task_id, patch) {
        Ok(task) => task.clone(),
        Err(TaskEditError::Locked(_)) => {
            return Err(format!(
                "Task {task_id} is completed. Reopen it with 'undo {task_id}' to edit."
            ));
        }
        Err(e) => return Err(format!("Error updating task: {e}")),
    };
    ctx.commit_best_effort();
    Ok(render_tasks(&[&task]))
}

fn import_csv(ctx: &mut AppContext, path: &str) -> Result<String, String> {
    signed_in(ctx)?;
    let tasks = load_tasks_from_csv(path).map_err(|e| format!("Error importing tasks: {e}"))?;
    if let Some(task) = tasks.iter().find(|t| !ctx.can_plan_for(&t.student_id)) {
        return Err(format!(
            "Cannot import task {} for {}; nothing was imported.",
            task.id, task.student_id
        ));
    }
    let added = ctx.store_mut().import_tasks(tasks);
    ctx.commit_best_effort();
    Ok(format!("Imported {added} tasks from {path}."))
}

fn report(result: Result<String, String>) {
    match result {
        Ok(message) | Err(message) => println!("{message}"),
    }
}

fn main() {
    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Config error: {e}");
            std::process::exit(1);
        }
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.logging.filter)),
        )
        .with_writer(io::stderr)
        .init();

    let today = chrono::Local::now().date_naive();
    let mut ctx = match AppContext::bootstrap(&config, today) {
        Ok(ctx) => ctx,
        Err(e) => {
            eprintln!("Startup error: {e}");
            std::process::exit(1);
        }
    };

    println!("Music Flow (CLI) - type 'help' for commands\n");
    if let Some(user) = ctx.current_user() {
        println!("Signed in as {} <{}> ({}).", user.name, user.email, user.role);
    }

    let stdin = io::stdin();
    let mut line = String::new();
    loop {
        print!("> ");
        let _ = io::stdout().flush();
        line.clear();
        match stdin.read_line(&mut line) {
            Ok(0) | Err(_) => break,
            Ok(_) => {}
        }
        let input = line.trim();
        if input.is_empty() {
            continue;
        }

        let mut parts = input.split_whitespace();
        let cmd = parts.next().unwrap_or("");

        match cmd {
            "help" => print_help(),
            "quit" | "exit" => break,
            "whoami" => match ctx.current_user() {
                Some(user) => {
                    let link = match LinkState::of(user) {
                        LinkState::Linked(teacher) => format!(", linked to {teacher}"),
                        LinkState::Unlinked if user.is_student() => ", no teacher".to_string(),
                        LinkState::Unlinked => String::new(),
                    };
                    println!("{} <{}> ({}{}).", user.name, user.email, user.role, link);
                }
                None => println!("Not signed in."),
            },
            "login" => match parts.next() {
                Some(email) => match ctx.login(email) {
                    Some(user) => println!("Signed in as {} ({}).", user.name, user.role),
                    None => println!("No user with email '{email}'."),
                },
                None => println!("Usage: login <email>"),
            },
            "logout" => {
                ctx.logout();
                println!("Signed out.");
            }
            "users" => {
                let users: Vec<&User> = ctx.store().users().iter().collect();
                println!("{}", render_users(&users));
            }
            "tasks" => {
                let result = signed_in(&ctx).and_then(|user| {
                    let student_id = parts.next().map(str::to_string).unwrap_or(user.id);
                    if !ctx.can_plan_for(&student_id) {
                        return Err(format!("Tasks of {student_id} are not visible to you."));
                    }
                    Ok(render_tasks(&ctx.store().get_student_tasks(&student_id)))
                });
                report(result);
            }
            "week" => {
                let result = signed_in(&ctx).and_then(|user| {
                    let date = match parts.next() {
                        Some(s) => parse_date(s)?,
                        None => today,
                    };
                    let student_id = parts.next().map(str::to_string).unwrap_or(user.id);
                    if !ctx.can_plan_for(&student_id) {
                        return Err(format!("Tasks of {student_id} are not visible to you."));
                    }
                    let week = recurrence::week_of(date)
                        .ok_or_else(|| format!("Date {date} is out of range."))?;
                    let rows: Vec<Vec<String>> = ctx
                        .store()
                        .daily_progress(&student_id, week[0], week[6])
                        .into_iter()
                        .map(|day| {
                            vec![
                                day.date.format("%Y-%m-%d").to_string(),
                                day.date.weekday().to_string(),
                                format!("{}/{}", day.done, day.total),
                            ]
                        })
                        .collect();
                    Ok(render_table(&["date", "day", "done"], &rows))
                });
                report(result);
            }
            "add" | "assign" => {
                let student = if cmd == "assign" { parts.next() } else { None };
                let date_s = parts.next();
                let minutes_s = parts.next();
                let title = parts.collect::<Vec<_>>().join(" ");
                let usage = if cmd == "assign" {
                    "Usage: assign <student_id> <YYYY-MM-DD> <minutes> <title...>"
                } else {
                    "Usage: add <YYYY-MM-DD> <minutes> <title...>"
                };
                match (date_s, minutes_s, cmd == "add" || student.is_some()) {
                    (Some(date_s), Some(minutes_s), true) => {
                        let result = parse_date(date_s)
                            .and_then(|date| Ok((date, parse_minutes(minutes_s)?)))
                            .and_then(|(date, minutes)| plan(&mut ctx, student, date, minutes, title, None))
                            .map(|ids| format!("Added task {}.", ids.join(", ")));
                        report(result);
                    }
                    _ => println!("{usage}"),
                }
            }
            "repeat" => {
                let start_s = parts.next();
                let until_s = parts.next();
                let days_s = parts.next();
                let minutes_s = parts.next();
                let title = parts.collect::<Vec<_>>().join(" ");
                match (start_s, until_s, days_s, minutes_s) {
                    (Some(start_s), Some(until_s), Some(days_s), Some(minutes_s)) => {
                        let result = (|| -> Result<String, String> {
                            let start = parse_date(start_s)?;
                            let until = parse_date(until_s)?;
                            let weekdays = days_s.parse::<WeekdaySet>().map_err(|e| e.to_string())?;
                            let minutes = parse_minutes(minutes_s)?;
                            let repeat = WeeklyRepeat { until, weekdays };
                            let ids = plan(&mut ctx, None, start, minutes, title, Some(repeat))?;
                            Ok(format!("Added {} tasks.", ids.len()))
                        })();
                        report(result);
                    }
                    _ => println!("Usage: repeat <start> <until> <weekdays> <minutes> <title...>"),
                }
            }
            "done" => match parts.next() {
                Some(id) => {
                    let rating = parts.next();
                    let comment = parts.collect::<Vec<_>>().join(" ");
                    let result = (|| -> Result<String, String> {
                        let feedback = match rating {
                            Some(r) => {
                                let rating: u8 = r.parse().map_err(|_| "Invalid rating (1-5)".to_string())?;
                                Feedback::new(rating, Some(comment)).map_err(|e| e.to_string())?
                            }
                            None => Feedback::skipped(),
                        };
                        managed_task(&ctx, id)?;
                        ctx.store_mut().complete_task(id, feedback);
                        ctx.commit_best_effort();
                        Ok(format!("Completed task {id}."))
                    })();
                    report(result);
                }
                None => println!("Usage: done <id> [rating] [comment...]"),
            },
            "undo" => match parts.next() {
                Some(id) => {
                    let result = managed_task(&ctx, id).map(|_| {
                        ctx.store_mut().reopen_task(id);
                        ctx.commit_best_effort();
                        format!("Reopened task {id}.")
                    });
                    report(result);
                }
                None => println!("Usage: undo <id>"),
            },
            "toggle" => match parts.next() {
                Some(id) => {
                    let result = managed_task(&ctx, id).and_then(|_| {
                        let status = ctx
                            .store_mut()
                            .toggle_task_status(id)
                            .ok_or_else(|| format!("Task {id} not found."))?;
                        ctx.commit_best_effort();
                        Ok(format!("Task {id} is now {status}."))
                    });
                    report(result);
                }
                None => println!("Usage: toggle <id>"),
            },
            "delete" => match parts.next() {
                Some(id) => {
                    let result = managed_task(&ctx, id).map(|_| {
                        ctx.store_mut().delete_task(id);
                        ctx.commit_best_effort();
                        format!("Deleted task {id}.")
                    });
                    report(result);
                }
                None => println!("Usage: delete <id>"),
            },
            "title" | "objective" => {
                let id = parts.next();
                let text = parts.collect::<Vec<_>>().join(" ");
                match id {
                    Some(id) if cmd == "objective" || !text.is_empty() => {
                        let patch = if cmd == "title" {
                            TaskPatch::default().title(text)
                        } else {
                            TaskPatch::default().objective(text)
                        };
                        report(patch_task(&mut ctx, id, patch));
                    }
                    _ => println!("Usage: {cmd} <id> <text...>"),
                }
            }
            "date" => match (parts.next(), parts.next()) {
                (Some(id), Some(date_s)) => {
                    let result = parse_date(date_s)
                        .and_then(|date| patch_task(&mut ctx, id, TaskPatch::default().date(date)));
                    report(result);
                }
                _ => println!("Usage: date <id> <YYYY-MM-DD>"),
            },
            "duration" => match (parts.next(), parts.next()) {
                (Some(id), Some(minutes_s)) => {
                    let result = parse_minutes(minutes_s).and_then(|minutes| {
                        patch_task(&mut ctx, id, TaskPatch::default().duration_minutes(minutes))
                    });
                    report(result);
                }
                _ => println!("Usage: duration <id> <minutes>"),
            },
            "attach" => match (parts.next(), parts.next()) {
                (Some(id), Some(url)) => {
                    let result = ctx
                        .store()
                        .find_task(id)
                        .map(|task| task.materials.clone())
                        .ok_or_else(|| format!("Task {id} not found."))
                        .and_then(|mut materials| {
                            materials.push(Material::link(url));
                            patch_task(&mut ctx, id, TaskPatch::default().materials(materials))
                        });
                    report(result);
                }
                _ => println!("Usage: attach <id> <url>"),
            },
            "files" => {
                let query = parts.collect::<Vec<_>>().join(" ");
                println!("{}", render_files(&ctx.store().search_files(&query)));
            }
            "upload" => {
                let kind_s = parts.next();
                let url = parts.next();
                let title = parts.collect::<Vec<_>>().join(" ");
                match (kind_s, url) {
                    (Some(kind_s), Some(url)) if !title.is_empty() => {
                        let result = signed_in(&ctx).and_then(|user| {
                            let kind: MaterialKind = kind_s.parse()?;
                            let material = Material::new(
                                music_flow::task::new_record_id(),
                                title,
                                kind,
                                url,
                            )
                            .uploaded_by(user.id);
                            let id = material.id.clone();
                            ctx.store_mut().add_file(material);
                            ctx.commit_best_effort();
                            Ok(format!("Uploaded file {id}."))
                        });
                        report(result);
                    }
                    _ => println!("Usage: upload <pdf|link> <url> <title...>"),
                }
            }
            "students" => {
                let query = parts.collect::<Vec<_>>().join(" ");
                let result = signed_in(&ctx).and_then(|user| {
                    if !user.is_teacher() {
                        return Err("Only teachers have students.".to_string());
                    }
                    let students = ctx.store().search_students_for_teacher(&user.id, &query);
                    Ok(render_users(&students))
                });
                report(result);
            }
            "link" => match parts.next() {
                Some(code) => {
                    if ctx.current_user().is_none_or(|u| !u.is_student()) {
                        println!("Sign in as a student to link to a teacher.");
                    } else if ctx.link_to_teacher(code) {
                        ctx.commit_best_effort();
                        let teacher = ctx
                            .current_user()
                            .and_then(|u| ctx.store().linked_teacher(&u.id))
                            .map(|t| t.name.clone())
                            .unwrap_or_default();
                        println!("Linked to {teacher}.");
                    } else {
                        println!("Invite code '{code}' does not match any teacher.");
                    }
                }
                None => println!("Usage: link <invite_code>"),
            },
            "unlink" => {
                ctx.unlink_from_teacher();
                ctx.commit_best_effort();
                println!("Teacher link removed.");
            }
            "save" => match (parts.next(), parts.next()) {
                (Some("json"), Some(path)) => match save_store_to_json(ctx.store(), path) {
                    Ok(_) => println!("Store saved to {path}."),
                    Err(e) => println!("Error saving store: {e}"),
                },
                _ => println!("Usage: save json <path>"),
            },
            "load" => match (parts.next(), parts.next()) {
                (Some("json"), Some(path)) => match load_store_from_json(path) {
                    Ok(store) => {
                        ctx.replace_store(store);
                        ctx.commit_best_effort();
                        println!("Store loaded from {path}.");
                    }
                    Err(e) => println!("Error loading store: {e}"),
                },
                _ => println!("Usage: load json <path>"),
            },
            "export" => match (parts.next(), parts.next()) {
                (Some("csv"), Some(path)) => match save_tasks_to_csv(ctx.store().tasks(), path) {
                    Ok(_) => println!("Tasks exported to {path}."),
                    Err(e) => println!("Error exporting tasks: {e}"),
                },
                _ => println!("Usage: export csv <path>"),
            },
            "import" => match (parts.next(), parts.next()) {
                (Some("csv"), Some(path)) => report(import_csv(&mut ctx, path)),
                _ => println!("Usage: import csv <path>"),
            },
            _ => {
                println!("Unknown command. Type 'help'.");
            }
        }
    }
}
