//! `provctl show`

use crate::Context;
use crate::cli::ShowArgs;
use crate::ui;
use anyhow::{Context as _, Result};
use colored::Colorize;
use provisioning::model::{SiteCollection, SubSite};
use provisioning::{Hierarchy, LoadOptions, PackageReference, load_hierarchy, resolve};

pub fn run(_ctx: &Context, args: ShowArgs) -> Result<()> {
    let reference = PackageReference::LocalPath(args.path.clone());
    let package = resolve(&reference, None, None)
        .with_context(|| format!("Could not resolve {reference}"))?;
    let hierarchy = load_hierarchy(&package, &LoadOptions::default())
        .with_context(|| format!("Could not load {reference}"))?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&hierarchy)?);
        return Ok(());
    }

    print_hierarchy(&hierarchy);
    Ok(())
}

fn print_hierarchy(hierarchy: &Hierarchy) {
    ui::header(
        hierarchy
            .display_name
            .as_deref()
            .unwrap_or("Provisioning Hierarchy"),
    );
    ui::kv("schema", hierarchy.schema.namespace());
    if let Some(version) = &hierarchy.version {
        ui::kv("version", version);
    }
    if let Some(author) = &hierarchy.author {
        ui::kv("author", author);
    }
    if let Some(description) = &hierarchy.description {
        ui::kv("description", description);
    }

    if !hierarchy.parameters.is_empty() {
        ui::section("Parameters");
        for (name, value) in &hierarchy.parameters {
            ui::kv(name, value);
        }
    }

    ui::section(&format!("Templates ({})", hierarchy.templates.len()));
    for template in &hierarchy.templates {
        let counts = ui::counts(&[
            ("features", template.features.len()),
            ("fields", template.fields.len()),
            ("content types", template.content_types.len()),
            ("lists", template.lists.len()),
            ("files", template.files.len()),
            ("properties", template.property_bag_entries.len()),
        ]);
        println!("  {} {}", template.id.bold(), counts.dimmed());
    }

    ui::section(&format!("Sequences ({})", hierarchy.sequences.len()));
    for sequence in &hierarchy.sequences {
        println!(
            "  {} {}",
            sequence.id.bold(),
            format!("{} site(s)", sequence.site_count()).dimmed()
        );
        for collection in &sequence.site_collections {
            println!("    {}", site_collection_line(collection));
            print_subsites(&collection.sites, 3);
        }
    }
}

fn site_collection_line(collection: &SiteCollection) -> String {
    let address = collection
        .url
        .as_deref()
        .or(collection.alias.as_deref())
        .unwrap_or("-");
    format!(
        "{} {} [{:?}] {}",
        collection.title,
        address.cyan(),
        collection.kind,
        collection.templates.join(", ").dimmed()
    )
}

fn print_subsites(sites: &[SubSite], depth: usize) {
    for site in sites {
        println!(
            "{}{} {} {}",
            "  ".repeat(depth),
            site.title,
            site.url.cyan(),
            site.templates.join(", ").dimmed()
        );
        print_subsites(&site.sites, depth + 1);
    }
}
