mod config;
mod session_store;

use std::{path::PathBuf, sync::Arc};

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use client_core::{
    AuthProvider, CallbackParams, ClientEvent, CnicImages, DashboardClient, GuardOutcome,
    HttpBackend, ImageUpload, NoticeVariant,
};
use shared::domain::{
    BranchChanges, BranchId, Employee, EmployeeChanges, EmployeeId, NewBranch, NewEmployee,
    ProfileChanges, Role,
};
use tokio::sync::broadcast;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(about = "Staff and branch administration console")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    Login {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
    Logout,
    Whoami,
    /// Pages the signed-in user may open.
    Nav,
    /// Resolves a page path through the route guard.
    Open { path: String },
    #[command(subcommand)]
    Employees(EmployeeCommand),
    #[command(subcommand)]
    Branches(BranchCommand),
    Stats,
    BranchOverview,
    #[command(subcommand)]
    Profile(ProfileCommand),
    /// Handles an emailed auth link (`...?token=...&type=recovery`).
    Callback { link: String },
    ResetPassword {
        #[arg(long)]
        password: String,
        #[arg(long)]
        confirm: String,
    },
    /// Issues a fresh download link for a stored image reference.
    SignUrl { reference: String },
}

#[derive(Subcommand, Debug)]
enum EmployeeCommand {
    List,
    Add(NewEmployeeArgs),
    Update {
        id: uuid::Uuid,
        #[command(flatten)]
        changes: EmployeeChangeArgs,
    },
    Delete { id: uuid::Uuid },
}

#[derive(Args, Debug)]
struct NewEmployeeArgs {
    #[arg(long)]
    full_name: String,
    #[arg(long)]
    email: String,
    #[arg(long, value_parser = parse_role, default_value = "employee")]
    role: Role,
    #[arg(long)]
    branch: Option<i64>,
    #[arg(long)]
    salary: Option<f64>,
    #[arg(long)]
    phone: Option<String>,
    #[arg(long)]
    address: Option<String>,
    #[arg(long)]
    cnic_number: Option<String>,
    #[command(flatten)]
    images: ImageArgs,
}

#[derive(Args, Debug)]
struct EmployeeChangeArgs {
    #[arg(long)]
    full_name: Option<String>,
    #[arg(long)]
    email: Option<String>,
    #[arg(long, value_parser = parse_role)]
    role: Option<Role>,
    #[arg(long)]
    branch: Option<i64>,
    #[arg(long)]
    salary: Option<f64>,
    #[arg(long)]
    phone: Option<String>,
    #[arg(long)]
    address: Option<String>,
    #[arg(long)]
    cnic_number: Option<String>,
    #[command(flatten)]
    images: ImageArgs,
}

#[derive(Args, Debug)]
struct ImageArgs {
    /// Front side of the identity card.
    #[arg(long)]
    front: Option<PathBuf>,
    #[arg(long)]
    back: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum BranchCommand {
    List,
    Add {
        #[arg(long)]
        name: String,
        #[arg(long)]
        location: Option<String>,
    },
    Update {
        id: i64,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        location: Option<String>,
    },
    Delete { id: i64 },
}

#[derive(Subcommand, Debug)]
enum ProfileCommand {
    Show,
    Update {
        #[arg(long)]
        full_name: Option<String>,
        #[arg(long)]
        phone: Option<String>,
        #[arg(long)]
        address: Option<String>,
    },
    Password {
        #[arg(long)]
        new: String,
        #[arg(long)]
        confirm: String,
    },
}

fn parse_role(raw: &str) -> Result<Role, String> {
    raw.parse::<Role>().map_err(|err| err.to_string())
}

async fn read_image(path: Option<PathBuf>) -> Result<Option<ImageUpload>> {
    let Some(path) = path else {
        return Ok(None);
    };
    let bytes = tokio::fs::read(&path)
        .await
        .with_context(|| format!("failed to read image '{}'", path.display()))?;
    let content_type = mime_guess::from_path(&path)
        .first_raw()
        .unwrap_or("application/octet-stream");
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    Ok(Some(ImageUpload {
        file_name,
        content_type: content_type.to_string(),
        bytes,
    }))
}

async fn read_images(args: ImageArgs) -> Result<CnicImages> {
    Ok(CnicImages {
        front: read_image(args.front).await?,
        back: read_image(args.back).await?,
    })
}

fn print_employee(employee: &Employee) {
    let branch = employee
        .branch
        .as_ref()
        .map(|branch| branch.name.as_str())
        .unwrap_or("-");
    println!(
        "{}  {:<24} {:<28} {:<8} {:<12} {:>10.2}",
        employee.id,
        employee.full_name,
        employee.email,
        employee.role.as_str(),
        branch,
        employee.salary_or_zero()
    );
}

/// Prints queued notices to stderr.
fn flush_notices(events: &mut broadcast::Receiver<ClientEvent>) {
    while let Ok(event) = events.try_recv() {
        if let ClientEvent::Notice(notice) = event {
            let marker = match notice.variant {
                NoticeVariant::Destructive => "!",
                NoticeVariant::Default => "*",
            };
            eprintln!("{marker} {}: {}", notice.title, notice.description);
        }
    }
}

async fn run(client: &Arc<DashboardClient>, command: Command) -> Result<()> {
    match command {
        Command::Login { email, password } => {
            let user = client.sign_in(&email, &password).await?;
            println!("signed in as {} ({})", user.full_name(), user.role());
        }
        Command::Logout => {
            client.sign_out().await?;
            println!("signed out");
        }
        Command::Whoami => match client.state().await.auth.user {
            Some(user) => println!(
                "{} <{}> role={} branch={}",
                user.full_name(),
                user.email,
                user.role(),
                user.branch_id()
                    .map(|id| id.to_string())
                    .unwrap_or_else(|| "-".into())
            ),
            None => println!("not signed in"),
        },
        Command::Nav => {
            for item in client.navigation().await {
                println!("{:<10} {}", item.name, item.route.path());
            }
        }
        Command::Open { path } => match client.navigate(&path).await {
            GuardOutcome::Wait => println!("session is still loading"),
            GuardOutcome::Render(route) => println!("render {}", route.path()),
            GuardOutcome::Redirect { to, from, .. } => match from {
                Some(from) => println!("redirect {} (from {from})", to.path()),
                None => println!("redirect {}", to.path()),
            },
        },
        Command::Employees(command) => run_employees(client, command).await?,
        Command::Branches(command) => run_branches(client, command).await?,
        Command::Stats => {
            let stats = client.fetch_dashboard_stats().await?;
            println!("employees       {}", stats.total_employees);
            println!("branches        {}", stats.total_branches);
            println!("average salary  {:.2}", stats.average_salary);
            println!("monthly growth  {:.1}%", stats.monthly_growth);
            for entry in &stats.role_distribution {
                println!("role {:<10} {}", entry.role.as_str(), entry.count);
            }
            for branch in &stats.salary_by_branch {
                println!(
                    "branch {:<16} employees={} average={:.2}",
                    branch.branch_name, branch.employee_count, branch.average_salary
                );
            }
        }
        Command::BranchOverview => {
            client.fetch_employees().await?;
            let Some(view) = client.branch_overview().await else {
                bail!("no branch is assigned to the signed-in user");
            };
            println!("branch {} employees={}", view.branch_id, view.employee_count);
            for entry in &view.role_distribution {
                println!("role {:<10} {}", entry.role.as_str(), entry.count);
            }
        }
        Command::Profile(command) => run_profile(client, command).await?,
        Command::Callback { link } => {
            let route = client
                .handle_auth_callback(&CallbackParams::from_query(&link))
                .await;
            println!("continue at {}", route.path());
        }
        Command::ResetPassword { password, confirm } => {
            let route = client.reset_password(&password, &confirm).await?;
            println!("continue at {}", route.path());
        }
        Command::SignUrl { reference } => {
            let signed = client.images().resign(&reference).await?;
            println!("{}", signed.url);
            println!("expires {}", signed.expires_at.to_rfc3339());
        }
    }
    Ok(())
}

async fn run_employees(client: &Arc<DashboardClient>, command: EmployeeCommand) -> Result<()> {
    match command {
        EmployeeCommand::List => {
            for employee in client.fetch_employees().await? {
                print_employee(&employee);
            }
        }
        EmployeeCommand::Add(args) => {
            let images = read_images(args.images).await?;
            let draft = NewEmployee {
                full_name: args.full_name,
                email: args.email,
                phone: args.phone,
                address: args.address,
                role: args.role,
                branch_id: args.branch.map(BranchId),
                salary: args.salary,
                cnic_number: args.cnic_number,
            };
            let created = client.add_employee(draft, images).await?;
            print_employee(&created.employee);
            println!("temporary password: {}", created.temporary_password);
        }
        EmployeeCommand::Update { id, changes } => {
            let images = read_images(changes.images).await?;
            let draft = EmployeeChanges {
                full_name: changes.full_name,
                email: changes.email,
                phone: changes.phone,
                address: changes.address,
                role: changes.role,
                branch_id: changes.branch.map(BranchId),
                salary: changes.salary,
                cnic_number: changes.cnic_number,
                ..EmployeeChanges::default()
            };
            if draft.is_empty() && images.front.is_none() && images.back.is_none() {
                bail!("nothing to update");
            }
            let updated = client
                .update_employee(EmployeeId(id), draft, images)
                .await?;
            print_employee(&updated);
        }
        EmployeeCommand::Delete { id } => {
            client.delete_employee(EmployeeId(id)).await?;
            println!("deleted employee {id}");
        }
    }
    Ok(())
}

async fn run_branches(client: &Arc<DashboardClient>, command: BranchCommand) -> Result<()> {
    match command {
        BranchCommand::List => {
            for entry in client.fetch_branches().await? {
                println!(
                    "{:>4}  {:<20} {:<20} employees={}",
                    entry.branch.id,
                    entry.branch.name,
                    entry.branch.location.as_deref().unwrap_or("-"),
                    entry.employee_count
                );
            }
        }
        BranchCommand::Add { name, location } => {
            let entry = client.add_branch(NewBranch { name, location }).await?;
            println!("created branch {}", entry.branch.id);
        }
        BranchCommand::Update { id, name, location } => {
            let entry = client
                .update_branch(BranchId(id), BranchChanges { name, location })
                .await?;
            println!(
                "updated branch {} ({} employees)",
                entry.branch.id, entry.employee_count
            );
        }
        BranchCommand::Delete { id } => {
            client.delete_branch(BranchId(id)).await?;
            println!("deleted branch {id}");
        }
    }
    Ok(())
}

async fn run_profile(client: &Arc<DashboardClient>, command: ProfileCommand) -> Result<()> {
    match command {
        ProfileCommand::Show => {
            let Some(user) = client.state().await.auth.user else {
                bail!("not signed in");
            };
            print_employee(&user.profile);
            println!("phone   {}", user.profile.phone.as_deref().unwrap_or("-"));
            println!("address {}", user.profile.address.as_deref().unwrap_or("-"));
        }
        ProfileCommand::Update {
            full_name,
            phone,
            address,
        } => {
            let updated = client
                .update_profile(ProfileChanges {
                    full_name,
                    phone,
                    address,
                })
                .await?;
            print_employee(&updated);
        }
        ProfileCommand::Password { new, confirm } => {
            client.change_password(&new, &confirm).await?;
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let settings = config::load_settings();
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&settings.log_filter));
    tracing_subscriber::fmt().with_env_filter(filter).init();
    let cli = Cli::parse();

    let backend = Arc::new(HttpBackend::new(settings.backend_config()));
    if let Some(session) = session_store::load(&settings.session_file).await {
        backend.set_session(session).await?;
    }

    let client = DashboardClient::new(backend.clone(), settings.storage_bucket.clone());
    let mut events = client.subscribe_events();
    let subscription = client.attach_auth_listener();
    let phase = client.initialize().await;
    info!(?phase, backend = %settings.backend_url, "console ready");

    let outcome = run(&client, cli.command).await;
    subscription.unsubscribe();
    flush_notices(&mut events);

    match backend.current_session().await {
        Some(session) => session_store::save(&settings.session_file, &session).await?,
        None => session_store::clear(&settings.session_file).await?,
    }
    outcome
}

#[cfg(test)]
mod tests {
    use std::time::{SystemTime, UNIX_EPOCH};

    use super::*;

    fn temp_file(name: &str, bytes: &[u8]) -> PathBuf {
        let suffix = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos();
        let dir = std::env::temp_dir().join(format!("staff_console_image_{suffix}_{name}"));
        std::fs::create_dir_all(&dir).expect("dir");
        let path = dir.join(name);
        std::fs::write(&path, bytes).expect("write");
        path
    }

    #[tokio::test]
    async fn bitmap_scan_is_accepted_as_an_image() {
        let path = temp_file("scan.bmp", b"BM\0\0");
        let upload = read_image(Some(path.clone()))
            .await
            .expect("read")
            .expect("upload");
        assert_eq!(upload.file_name, "scan.bmp");
        assert_eq!(upload.content_type, "image/bmp");
        assert!(upload.validate().is_ok());
        if let Some(parent) = path.parent() {
            let _ = std::fs::remove_dir_all(parent);
        }
    }

    #[tokio::test]
    async fn unknown_extension_is_rejected_as_non_image() {
        let path = temp_file("notes.unknownext", b"hello");
        let upload = read_image(Some(path.clone()))
            .await
            .expect("read")
            .expect("upload");
        assert_eq!(upload.content_type, "application/octet-stream");
        assert!(upload.validate().is_err());
        if let Some(parent) = path.parent() {
            let _ = std::fs::remove_dir_all(parent);
        }
    }

    #[tokio::test]
    async fn missing_path_means_no_upload() {
        assert!(read_image(None).await.expect("read").is_none());
    }
}
