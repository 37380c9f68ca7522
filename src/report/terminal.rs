use std::path::Path;

use anyhow::Result;
use colored::*;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Attribute, Cell, Color, ContentArrangement, Table};

use crate::license::spdx::NOASSERTION;
use crate::models::{Module, Resolution};

/// Render a colored terminal report.
pub fn render(resolutions: &[Resolution], path: &Path, tree: bool, quiet: bool) -> Result<()> {
    if quiet {
        println!("{}", summary_line(resolutions));
        return Ok(());
    }

    println!(
        "\n {} v{}",
        "sbom-modules".bold(),
        env!("CARGO_PKG_VERSION")
    );
    println!(" Resolving: {}\n", path.display());

    for resolution in resolutions {
        let count = resolution.modules.len();
        let nested: usize = resolution.modules.iter().map(Module::tree_size).sum();
        println!(
            " {} {} ({} modules{})\n",
            "[MODULES]".cyan().bold(),
            resolution.ecosystem,
            count,
            if tree { format!(", {} nested", nested) } else { String::new() }
        );
        println!("{}", module_table(&resolution.modules));
        if !resolution.unresolved.is_empty() {
            println!(
                " {} missing from lock: {}",
                "[WARN]".yellow().bold(),
                resolution.unresolved.join(", ")
            );
        }

        if tree {
            if let Some(root) = resolution.modules.iter().find(|m| m.root) {
                println!();
                for line in tree_lines(root) {
                    println!(" {}", line);
                }
            }
        }
        println!();
    }

    Ok(())
}

fn module_table(modules: &[Module]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("Name").add_attribute(Attribute::Bold),
            Cell::new("Version").add_attribute(Attribute::Bold),
            Cell::new("Checksum").add_attribute(Attribute::Bold),
            Cell::new("License").add_attribute(Attribute::Bold),
            Cell::new("Supplier").add_attribute(Attribute::Bold),
        ]);

    for module in modules {
        let license = display_license(module);
        let license_color = if license == NOASSERTION || license == "-" {
            Color::DarkGrey
        } else {
            Color::Green
        };

        let mut name = Cell::new(&module.name);
        if module.root {
            name = name.fg(Color::Cyan).add_attribute(Attribute::Bold);
        }

        table.add_row(vec![
            name,
            Cell::new(&module.version),
            Cell::new(module.checksum.algorithm.to_string()),
            Cell::new(license).fg(license_color),
            Cell::new(&module.supplier.name),
        ]);
    }

    table
}

fn display_license(module: &Module) -> &str {
    if module.license_declared.is_empty() {
        "-"
    } else {
        &module.license_declared
    }
}

/// Indented `name@version` lines for a module and its descendants.
fn tree_lines(root: &Module) -> Vec<String> {
    let mut lines = vec![format!("{}@{}", root.name, root.version)];
    push_children(root, "", &mut lines);
    lines
}

fn push_children(module: &Module, prefix: &str, lines: &mut Vec<String>) {
    let count = module.modules.len();
    for (i, (key, child)) in module.modules.iter().enumerate() {
        let last = i + 1 == count;
        let branch = if last { "└── " } else { "├── " };
        lines.push(format!("{}{}{}@{}", prefix, branch, key, child.version));
        let next = format!("{}{}", prefix, if last { "    " } else { "│   " });
        push_children(child, &next, lines);
    }
}

fn summary_line(resolutions: &[Resolution]) -> String {
    resolutions
        .iter()
        .map(|r| {
            if r.unresolved.is_empty() {
                format!("{}: {} modules", r.ecosystem, r.modules.len())
            } else {
                format!(
                    "{}: {} modules ({} unresolved)",
                    r.ecosystem,
                    r.modules.len(),
                    r.unresolved.len()
                )
            }
        })
        .collect::<Vec<_>>()
        .join("  ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Ecosystem;

    fn module(name: &str, version: &str) -> Module {
        Module {
            name: name.to_string(),
            version: version.to_string(),
            ..Module::default()
        }
    }

    #[test]
    fn test_tree_lines() {
        let mut b = module("b", "2.0.0");
        b.modules.insert("acme/c".to_string(), module("c", "3.0.0"));
        let mut root = module("app", "1.0.0");
        root.root = true;
        root.modules.insert("acme/a".to_string(), module("a", "1.0.0"));
        root.modules.insert("acme/b".to_string(), b);

        assert_eq!(
            tree_lines(&root),
            vec![
                "app@1.0.0",
                "├── acme/a@1.0.0",
                "└── acme/b@2.0.0",
                "    └── acme/c@3.0.0",
            ]
        );
    }

    #[test]
    fn test_module_table_lists_every_module() {
        let mut root = module("app", "1.0.0");
        root.root = true;
        let mut dep = module("left-pad", "1.3.0");
        dep.license_declared = "MIT".to_string();
        let rendered = module_table(&[root, dep]).to_string();
        assert!(rendered.contains("app"));
        assert!(rendered.contains("left-pad"));
        assert!(rendered.contains("MIT"));
        assert!(rendered.contains("SHA1"));
    }

    #[test]
    fn test_summary_line() {
        let resolutions = vec![
            Resolution {
                ecosystem: Ecosystem::Composer,
                modules: vec![module("a", "1")],
                unresolved: vec![],
            },
            Resolution {
                ecosystem: Ecosystem::Npm,
                modules: vec![],
                unresolved: vec!["left-pad".to_string()],
            },
        ];
        assert_eq!(summary_line(&resolutions), "Composer: 1 modules  NPM: 0 modules (1 unresolved)");
    }
}
