use anyhow::{bail, Context};
use chrono::{Local, NaiveDate};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use wardrobe::builder::OutfitBuilder;
use wardrobe::calendar::WeekPlan;
use wardrobe::callback::CallbackParams;
use wardrobe::export::ExportFormat;
use wardrobe::media::Upload;
use wardrobe::{
    parse_care_tags, AuthContext, Category, Item, ItemFilter, ItemPatch, ItemStatus, Layer,
    NewItem, NewOutfit, OutfitPatch, SessionStore, Slot, Wardrobe,
};

#[derive(Parser)]
#[command(name = "wardrobe", version, about = "Personal digital wardrobe")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Sign in with email and password
    Login {
        email: String,
        #[arg(long, env = "WARDROBE_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Create an account
    Signup {
        email: String,
        #[arg(long, env = "WARDROBE_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Email a sign-in link
    MagicLink { email: String },
    /// Finish sign-in with the URL the email link redirected to
    Callback { url: String },
    Logout,
    Whoami,
    #[command(subcommand)]
    Items(ItemsCommand),
    #[command(subcommand)]
    Outfits(OutfitsCommand),
    #[command(subcommand)]
    Plan(PlanCommand),
    /// Export the catalog
    Export {
        #[arg(long, short, default_value = "yaml")]
        format: ExportFormat,
        /// File to write; `-` for stdout. Defaults to wardrobe-export-<date>.<ext>
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    /// Upload a file and print a signed URL for it
    StorageTest {
        file: PathBuf,
        /// Delete the object again afterwards
        #[arg(long)]
        cleanup: bool,
    },
}

#[derive(Subcommand)]
enum ItemsCommand {
    List {
        #[arg(long)]
        category: Option<Category>,
        #[arg(long)]
        status: Option<ItemStatus>,
        #[arg(long)]
        subcategory: Option<String>,
        /// Comma-separated care tags; matches items with any of them
        #[arg(long)]
        tags: Option<String>,
    },
    Show { id: Uuid },
    Add(ItemFields),
    Edit {
        id: Uuid,
        #[command(flatten)]
        fields: ItemFields,
        /// Remove the layer
        #[arg(long, conflicts_with = "layer")]
        no_layer: bool,
    },
    Delete { id: Uuid },
}

#[derive(Args)]
struct ItemFields {
    #[arg(long)]
    category: Option<Category>,
    #[arg(long)]
    layer: Option<Layer>,
    #[arg(long)]
    subcategory: Option<String>,
    #[arg(long)]
    name: Option<String>,
    #[arg(long)]
    color: Option<String>,
    #[arg(long)]
    color_secondary: Option<String>,
    #[arg(long)]
    size: Option<String>,
    #[arg(long)]
    status: Option<ItemStatus>,
    /// Comma-separated care tags
    #[arg(long)]
    care: Option<String>,
    /// Image file to upload
    #[arg(long)]
    image: Option<PathBuf>,
    /// HTML detail document to upload
    #[arg(long)]
    detail: Option<PathBuf>,
}

#[derive(Args)]
struct SlotPicks {
    #[arg(long)]
    base: Option<Uuid>,
    #[arg(long)]
    mid: Option<Uuid>,
    #[arg(long)]
    outer: Option<Uuid>,
    #[arg(long)]
    bottom: Option<Uuid>,
    #[arg(long)]
    bottom_base: Option<Uuid>,
    #[arg(long)]
    shoes: Option<Uuid>,
    #[arg(long)]
    socks: Option<Uuid>,
    /// May be given more than once
    #[arg(long)]
    accessory: Vec<Uuid>,
}

impl SlotPicks {
    fn singles(&self) -> Vec<(Slot, Uuid)> {
        [
            (Slot::Base, self.base),
            (Slot::Mid, self.mid),
            (Slot::Outer, self.outer),
            (Slot::Bottom, self.bottom),
            (Slot::BottomBase, self.bottom_base),
            (Slot::Shoes, self.shoes),
            (Slot::Socks, self.socks),
        ]
        .into_iter()
        .filter_map(|(slot, id)| id.map(|id| (slot, id)))
        .collect()
    }

    fn ids(&self) -> Vec<Uuid> {
        let mut ids: Vec<Uuid> = self.singles().into_iter().map(|(_, id)| id).collect();
        ids.extend(self.accessory.iter().copied());
        ids
    }

    fn is_empty(&self) -> bool {
        self.ids().is_empty()
    }
}

#[derive(Subcommand)]
enum OutfitsCommand {
    List,
    Show { id: Uuid },
    /// Compose a new outfit from item ids
    Build {
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        notes: Option<String>,
        #[command(flatten)]
        picks: SlotPicks,
    },
    Edit {
        id: Uuid,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        notes: Option<String>,
        /// Start from empty slots instead of the current items
        #[arg(long)]
        reset: bool,
        #[command(flatten)]
        picks: SlotPicks,
    },
    Delete { id: Uuid },
}

#[derive(Subcommand)]
enum PlanCommand {
    /// Show the week containing a date (default today)
    Week {
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Schedule an outfit, or just a note, on a date
    Set {
        date: NaiveDate,
        #[arg(long)]
        outfit: Option<Uuid>,
        #[arg(long)]
        notes: Option<String>,
    },
    Clear { date: NaiveDate },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("wardrobe=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let wardrobe = Wardrobe::from_env().context("failed to load configuration")?;
    let store = SessionStore::new(&wardrobe.config().session_file);

    match cli.command {
        Command::Login { email, password } => {
            let session = wardrobe.sign_in(&email, &password).await?;
            store.save(&session)?;
            println!("Signed in as {}", session.user.email.as_deref().unwrap_or(&email));
        }
        Command::Signup { email, password } => match wardrobe.sign_up(&email, &password).await? {
            Some(session) => {
                store.save(&session)?;
                println!("Account created, signed in as {}", email);
            }
            None => println!("Account created. Confirm your email, then run `wardrobe login`."),
        },
        Command::MagicLink { email } => {
            let verifier = wardrobe.send_magic_link(&email).await?;
            store.save_verifier(&verifier)?;
            println!("Sign-in link sent to {}. Run `wardrobe callback <url>` with the link it opens.", email);
        }
        Command::Callback { url } => {
            let params = CallbackParams::parse(&url)?;
            let verifier = store.take_verifier()?;
            match wardrobe.complete_callback(params, verifier.as_ref()).await? {
                Some(session) => {
                    store.save(&session)?;
                    println!("Signed in as {}", session.user.email.as_deref().unwrap_or(&session.user.id));
                }
                None => println!("Nothing to sign in with. Run `wardrobe login` or `wardrobe magic-link`."),
            }
        }
        Command::Logout => {
            if let Ok(_ctx) = wardrobe.resume(&store).await {
                if let Err(e) = wardrobe.auth().sign_out().await {
                    tracing::warn!(error = %e, "sign-out request failed");
                }
            }
            store.clear()?;
            println!("Signed out");
        }
        Command::Whoami => {
            wardrobe.resume(&store).await?;
            let user = wardrobe.auth().get_user().await?;
            println!("{} {}", user.id, user.email.unwrap_or_default());
        }
        Command::Items(command) => {
            let ctx = wardrobe.resume(&store).await?;
            run_items(&wardrobe, &ctx, command).await?;
        }
        Command::Outfits(command) => {
            let ctx = wardrobe.resume(&store).await?;
            run_outfits(&wardrobe, &ctx, command).await?;
        }
        Command::Plan(command) => {
            let ctx = wardrobe.resume(&store).await?;
            run_plan(&wardrobe, &ctx, command).await?;
        }
        Command::Export { format, output } => {
            let ctx = wardrobe.resume(&store).await?;
            let items = wardrobe.items().list(&ctx, &ItemFilter::default()).await?;
            let text = format.render(&items)?;

            let output = output
                .unwrap_or_else(|| PathBuf::from(format.default_file_name(Local::now().date_naive())));
            if output.as_os_str() == "-" {
                print!("{}", text);
            } else {
                std::fs::write(&output, text)
                    .with_context(|| format!("failed to write {}", output.display()))?;
                eprintln!("Exported {} items to {} ({})", items.len(), output.display(), format.mime_type());
            }
        }
        Command::StorageTest { file, cleanup } => {
            let ctx = wardrobe.resume(&store).await?;
            let upload = Upload::from_path(&file).await?;
            let media = wardrobe.media();

            let path = media.upload_image(&ctx, Uuid::new_v4(), &upload).await?;
            println!("Uploaded {}", path);
            println!("{}", media.signed_url(&ctx, &path).await?);
            if cleanup {
                media.remove(&ctx, &[path.as_str()]).await?;
                println!("Removed {}", path);
            }
        }
    }

    Ok(())
}

fn print_item(item: &Item) {
    let layer = item.layer.map(|l| format!("/{}", l)).unwrap_or_default();
    let tags = item.care_tags_text();
    println!(
        "{}  {:<24} {}{:<7} {:<8}{}",
        item.id,
        item.display_name(),
        item.category,
        layer,
        item.status,
        if tags.is_empty() { String::new() } else { format!(" [{}]", tags) }
    );
}

async fn read_detail(path: Option<&PathBuf>) -> anyhow::Result<Option<String>> {
    match path {
        Some(path) => Ok(Some(
            tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("failed to read {}", path.display()))?,
        )),
        None => Ok(None),
    }
}

async fn read_image(path: Option<&PathBuf>) -> anyhow::Result<Option<Upload>> {
    match path {
        Some(path) => Ok(Some(Upload::from_path(path).await?)),
        None => Ok(None),
    }
}

async fn run_items(wardrobe: &Wardrobe, ctx: &AuthContext, command: ItemsCommand) -> anyhow::Result<()> {
    match command {
        ItemsCommand::List {
            category,
            status,
            subcategory,
            tags,
        } => {
            let filter = ItemFilter {
                category,
                status,
                subcategory,
                care_tags: tags.as_deref().map(parse_care_tags).unwrap_or_default(),
            };
            for item in wardrobe.items().list(ctx, &filter).await? {
                print_item(&item);
            }
        }
        ItemsCommand::Show { id } => {
            let Some(item) = wardrobe.items().get(ctx, id).await? else {
                bail!("item {} not found", id);
            };
            print_item(&item);
            for (label, value) in [
                ("subcategory", &item.subcategory),
                ("color", &item.color_primary),
                ("color 2", &item.color_secondary),
                ("size", &item.size),
            ] {
                if let Some(value) = value {
                    println!("  {:<12}{}", label, value);
                }
            }
            if let Some(url) = wardrobe.signed_urls(ctx, std::slice::from_ref(&item)).await.get(&item.id) {
                println!("  {:<12}{}", "image", url);
            }
            if let Some(url) = wardrobe.detail_url(ctx, &item).await? {
                println!("  {:<12}{}", "detail", url);
            }
        }
        ItemsCommand::Add(fields) => {
            let Some(category) = fields.category else {
                bail!("--category is required");
            };
            let mut item = NewItem::new(category);
            item.layer = fields.layer;
            item.subcategory = fields.subcategory;
            item.name = fields.name;
            item.color_primary = fields.color;
            item.color_secondary = fields.color_secondary;
            item.size = fields.size;
            item.status = fields.status.unwrap_or(ItemStatus::Clean);
            item.care_tags = fields.care.as_deref().map(parse_care_tags).unwrap_or_default();

            let image = read_image(fields.image.as_ref()).await?;
            let detail = read_detail(fields.detail.as_ref()).await?;
            let created = wardrobe
                .add_item(ctx, item, image.as_ref(), detail.as_deref())
                .await?;
            print_item(&created);
        }
        ItemsCommand::Edit { id, fields, no_layer } => {
            let patch = ItemPatch {
                category: fields.category,
                layer: if no_layer { Some(None) } else { fields.layer.map(Some) },
                subcategory: fields.subcategory.map(Some),
                name: fields.name.map(Some),
                color_primary: fields.color.map(Some),
                color_secondary: fields.color_secondary.map(Some),
                size: fields.size.map(Some),
                status: fields.status,
                care_tags: fields.care.as_deref().map(parse_care_tags),
                ..Default::default()
            };
            let image = read_image(fields.image.as_ref()).await?;
            let detail = read_detail(fields.detail.as_ref()).await?;
            let updated = wardrobe
                .edit_item(ctx, id, patch, image.as_ref(), detail.as_deref())
                .await?;
            print_item(&updated);
        }
        ItemsCommand::Delete { id } => {
            let Some(item) = wardrobe.items().get(ctx, id).await? else {
                bail!("item {} not found", id);
            };
            wardrobe.discard_item(ctx, &item).await?;
            println!("Deleted {}", item.display_name());
        }
    }
    Ok(())
}

async fn apply_picks(
    wardrobe: &Wardrobe,
    ctx: &AuthContext,
    builder: &mut OutfitBuilder,
    picks: &SlotPicks,
) -> anyhow::Result<()> {
    let items = wardrobe.items().get_many(ctx, &picks.ids()).await?;
    let find = |id: Uuid| {
        items
            .iter()
            .find(|item| item.id == id)
            .cloned()
            .with_context(|| format!("item {} not found", id))
    };

    for (slot, id) in picks.singles() {
        builder.select(slot, find(id)?)?;
    }
    for id in &picks.accessory {
        builder.select(Slot::Accessory, find(*id)?)?;
    }
    if builder.has_laundry_items() {
        eprintln!("warning: this outfit includes items waiting for the laundry");
    }
    Ok(())
}

async fn run_outfits(wardrobe: &Wardrobe, ctx: &AuthContext, command: OutfitsCommand) -> anyhow::Result<()> {
    match command {
        OutfitsCommand::List => {
            for outfit in wardrobe.outfits().list(ctx).await? {
                println!("{}  {}", outfit.id, outfit.display_name());
            }
        }
        OutfitsCommand::Show { id } => {
            let Some((outfit, urls)) = wardrobe.view_outfit(ctx, id).await? else {
                bail!("outfit {} not found", id);
            };
            println!("{}  {}", outfit.outfit.id, outfit.outfit.display_name());
            if let Some(notes) = &outfit.outfit.notes {
                println!("  {}", notes);
            }
            for slot in Slot::ALL {
                for item in outfit.items_in(*slot) {
                    let url = urls.get(&item.id).map(String::as_str).unwrap_or("");
                    println!("  {:<12}{}  {} {}", slot.as_str(), item.id, item.display_name(), url);
                }
            }
        }
        OutfitsCommand::Build { name, notes, picks } => {
            let mut builder = OutfitBuilder::new();
            apply_picks(wardrobe, ctx, &mut builder, &picks).await?;
            let refs = builder.associations()?;

            let outfit = NewOutfit {
                name,
                notes,
                cover_image_path: None,
            };
            let created = wardrobe.outfits().create(ctx, &outfit, &refs).await?;
            println!("Created {}  {} ({} items)", created.id, created.display_name(), refs.len());
        }
        OutfitsCommand::Edit {
            id,
            name,
            notes,
            reset,
            picks,
        } => {
            let patch = OutfitPatch {
                name: name.map(Some),
                notes: notes.map(Some),
                cover_image_path: None,
            };

            let refs = if reset || !picks.is_empty() {
                let mut builder = if reset {
                    OutfitBuilder::new()
                } else {
                    let Some(current) = wardrobe.outfits().get_with_items(ctx, id).await? else {
                        bail!("outfit {} not found", id);
                    };
                    OutfitBuilder::from_outfit(&current)
                };
                apply_picks(wardrobe, ctx, &mut builder, &picks).await?;
                Some(builder.associations()?)
            } else {
                None
            };

            wardrobe
                .outfits()
                .update(ctx, id, Some(&patch), refs.as_deref())
                .await?;
            println!("Updated {}", id);
        }
        OutfitsCommand::Delete { id } => {
            wardrobe.outfits().delete(ctx, id).await?;
            println!("Deleted {}", id);
        }
    }
    Ok(())
}

async fn run_plan(wardrobe: &Wardrobe, ctx: &AuthContext, command: PlanCommand) -> anyhow::Result<()> {
    match command {
        PlanCommand::Week { date } => {
            let date = date.unwrap_or_else(|| Local::now().date_naive());
            let week = WeekPlan::load(wardrobe, ctx, date).await?;
            for day in week.days() {
                let plan = week.plan_for(day);
                let outfit = week.outfit_name_for(day).unwrap_or(if plan.is_some() { "-" } else { "" });
                let notes = plan.and_then(|p| p.notes.as_deref()).unwrap_or("");
                println!("{} {}  {:<24} {}", day.format("%a"), day, outfit, notes);
            }
        }
        PlanCommand::Set { date, outfit, notes } => {
            let plan = wardrobe.plans().upsert(ctx, date, outfit, notes).await?;
            let outfit = match (&plan.outfit, plan.outfit_id) {
                (Some(summary), _) if summary.name.is_some() => {
                    summary.name.clone().unwrap_or_default()
                }
                (_, Some(id)) => id.to_string(),
                _ => "(no outfit)".to_string(),
            };
            println!("{}  {}", plan.plan_date, outfit);
        }
        PlanCommand::Clear { date } => {
            wardrobe.plans().delete_by_date(ctx, date).await?;
            println!("Cleared {}", date);
        }
    }
    Ok(())
}
