use anyhow::{bail, Context as _, Result};
use client_core::{
    project::ProjectKey, user::UserKey, Connection, Group, ListNode, Ontology, Project,
    Transport, User,
};
use shared::{
    context::is_iri,
    domain::{is_shortcode, ListNodeIri, ProjectIri, UserIri},
    Context, LangString,
};

use tracing::warn;

use crate::cli::{
    Command, ContextCommand, GroupCommand, ListCommand, OntologyCommand, ProjectChanges,
    ProjectCommand, UserCommand,
};

/// Runs `command` and then ends the session. A failed logout is logged and
/// never replaces the command's own outcome.
pub async fn run_session(connection: &mut Connection, command: Command) -> Result<()> {
    let result = run(&*connection, command).await;
    if connection.token().is_some() {
        if let Err(err) = connection.logout().await {
            warn!(error = %err, "logout failed");
        }
    }
    result
}

pub async fn run(transport: &dyn Transport, command: Command) -> Result<()> {
    match command {
        Command::Projects(command) => projects(transport, command).await,
        Command::Groups(command) => groups(transport, command).await,
        Command::Users(command) => users(transport, command).await,
        Command::Ontologies(command) => ontologies(transport, command).await,
        Command::Lists(command) => lists(transport, command).await,
        Command::Context(command) => context(command),
    }
}

pub async fn projects(transport: &dyn Transport, command: ProjectCommand) -> Result<()> {
    match command {
        ProjectCommand::List => {
            for project in Project::get_all(transport).await? {
                print_project_line(&project);
            }
        }
        ProjectCommand::Show { key } => {
            let project = fetch_project(transport, &key).await?;
            print_project(&project);
        }
        ProjectCommand::Create {
            shortcode,
            shortname,
            longname,
            description,
            lang,
            keywords,
            selfjoin,
        } => {
            let mut project = Project::new(
                &shortcode,
                shortname,
                longname,
                LangString::new().with(lang, description),
            )?;
            for keyword in keywords {
                project.add_keyword(keyword);
            }
            project.fields_mut().selfjoin = selfjoin;
            let created = project
                .create(transport)
                .await
                .with_context(|| format!("failed to create project {shortcode}"))?;
            print_project(&created);
        }
        ProjectCommand::Set(changes) => set_project(transport, changes).await?,
    }
    Ok(())
}

async fn set_project(transport: &dyn Transport, changes: ProjectChanges) -> Result<()> {
    let mut project = fetch_project(transport, &changes.key).await?;
    if let Some(longname) = changes.longname {
        project.fields_mut().longname = Some(longname);
    }
    if let Some(description) = changes.description {
        project.add_description(changes.lang, description);
    }
    for keyword in changes.add_keywords {
        project.add_keyword(keyword);
    }
    for keyword in &changes.remove_keywords {
        project.remove_keyword(keyword)?;
    }
    if let Some(selfjoin) = changes.selfjoin {
        project.fields_mut().selfjoin = selfjoin;
    }
    if let Some(status) = changes.status {
        project.fields_mut().status = status;
    }

    match project.update(transport).await? {
        Some(updated) => print_project(&updated),
        None => println!("project {} unchanged", project.shortcode()),
    }
    if changes.default_permissions {
        project.set_default_permissions(transport).await?;
        println!("default permissions set for project {}", project.shortcode());
    }
    Ok(())
}

async fn fetch_project(transport: &dyn Transport, key: &str) -> Result<Project> {
    let iri;
    let key = if is_iri(key) {
        iri = ProjectIri::new(key);
        ProjectKey::Iri(&iri)
    } else if is_shortcode(key) {
        ProjectKey::Shortcode(key)
    } else {
        ProjectKey::Shortname(key)
    };
    Project::fetch(transport, key)
        .await
        .with_context(|| format!("project {key:?} not found"))
}

pub async fn groups(transport: &dyn Transport, command: GroupCommand) -> Result<()> {
    let GroupCommand::List { project } = command;
    let groups = match project {
        Some(shortcode) => Group::get_all_for_project(transport, &shortcode).await?,
        None => Group::get_all(transport).await?,
    };
    for group in groups {
        let id = group.id().map_or("-", |id| id.as_str());
        println!("{id}\t{}\t{}", group.fields().name, group.project());
    }
    Ok(())
}

pub async fn users(transport: &dyn Transport, command: UserCommand) -> Result<()> {
    match command {
        UserCommand::List { project } => {
            let users = match project {
                Some(shortcode) => User::get_all_for_project(transport, &shortcode).await?,
                None => User::get_all(transport).await?,
            };
            for user in users {
                let id = user.id().map_or("-", |id| id.as_str());
                println!("{id}\t{}\t{}", user.fields().username, user.fields().email);
            }
        }
        UserCommand::Show { key } => {
            let iri;
            let user_key = if is_iri(&key) {
                iri = UserIri::new(key.as_str());
                UserKey::Iri(&iri)
            } else if key.contains('@') {
                UserKey::Email(&key)
            } else {
                UserKey::Username(&key)
            };
            let user = User::fetch(transport, user_key)
                .await
                .with_context(|| format!("user {key} not found"))?;
            let fields = user.fields();
            println!("iri:       {}", user.id().map_or("-", |id| id.as_str()));
            println!("username:  {}", fields.username);
            println!("email:     {}", fields.email);
            println!(
                "name:      {} {}",
                fields.given_name.as_deref().unwrap_or(""),
                fields.family_name.as_deref().unwrap_or("")
            );
            println!("sysadmin:  {}", fields.sysadmin);
            println!("active:    {}", fields.status);
            for (project, admin) in &fields.in_projects {
                println!("project:   {project}{}", if *admin { " (admin)" } else { "" });
            }
            for group in &fields.in_groups {
                println!("group:     {group}");
            }
        }
    }
    Ok(())
}

pub async fn ontologies(transport: &dyn Transport, command: OntologyCommand) -> Result<()> {
    match command {
        OntologyCommand::List { project } => {
            let ontologies = match project {
                Some(project) => {
                    Ontology::get_project_ontologies(transport, &ProjectIri::new(project)).await?
                }
                None => Ontology::get_all(transport).await?,
            };
            for ontology in ontologies {
                let id = ontology.id().map_or("-", |id| id.as_str());
                println!("{id}\t{}\t{}", ontology.fields().label, ontology.project());
            }
        }
        OntologyCommand::Show { shortcode, name } => {
            let ontology = Ontology::get_from_server(transport, &shortcode, &name)
                .await
                .with_context(|| format!("ontology {name} not found"))?;
            println!("{} ({})", ontology.name(), ontology.fields().label);
            if let Some(date) = ontology.last_modification_date() {
                println!("last modified {date}");
            }
            for class in ontology.resource_classes() {
                println!("class {}: {}", class.name(), class.fields().label);
                for (property, has) in class.has_properties() {
                    let inherited = if has.is_inherited() { " (inherited)" } else { "" };
                    println!("  {property} [{}]{inherited}", has.cardinality());
                }
            }
            for property in ontology.property_classes() {
                println!(
                    "property {} -> {}",
                    property.name(),
                    property.object().unwrap_or("?")
                );
            }
        }
    }
    Ok(())
}

pub async fn lists(transport: &dyn Transport, command: ListCommand) -> Result<()> {
    match command {
        ListCommand::List { project } => {
            let project = project.map(ProjectIri::new);
            for list in ListNode::get_all_lists(transport, project.as_ref()).await? {
                let id = list.id().map_or("-", |id| id.as_str());
                println!("{id}\t{}", list.fields().labels);
            }
        }
        ListCommand::Show { iri } => {
            let list = ListNode::fetch_list(transport, &ListNodeIri::new(iri.as_str()))
                .await
                .with_context(|| format!("list {iri} not found"))?;
            print_tree(&list, 0);
        }
    }
    Ok(())
}

pub fn context(command: ContextCommand) -> Result<()> {
    let (prefixes, value, expand) = match command {
        ContextCommand::Expand { value, prefixes } => (prefixes, value, true),
        ContextCommand::Compact { iri, prefixes } => (prefixes, iri, false),
    };
    let mut context = Context::default();
    for entry in &prefixes {
        let Some((prefix, iri)) = entry.split_once('=') else {
            bail!("prefix \"{entry}\" must look like name=iri");
        };
        context.add_prefix(prefix, Some(iri))?;
    }
    let converted = if expand {
        context.expand(&value)?
    } else {
        context.compact(&value)?
    };
    println!("{converted}");
    Ok(())
}

fn print_project_line(project: &Project) {
    let id = project.id().map_or("-", |id| id.as_str());
    println!("{}\t{}\t{id}", project.shortcode(), project.fields().shortname);
}

fn print_project(project: &Project) {
    let fields = project.fields();
    println!("iri:         {}", project.id().map_or("-", |id| id.as_str()));
    println!("shortcode:   {}", project.shortcode());
    println!("shortname:   {}", fields.shortname);
    println!("longname:    {}", fields.longname.as_deref().unwrap_or("-"));
    println!("description: {}", fields.description);
    let keywords: Vec<&str> = fields.keywords.iter().map(String::as_str).collect();
    println!("keywords:    {}", keywords.join(", "));
    println!("selfjoin:    {}", fields.selfjoin);
    println!("active:      {}", fields.status);
    for ontology in project.ontologies() {
        println!("ontology:    {ontology}");
    }
}

fn print_tree(node: &ListNode, depth: usize) {
    println!(
        "{:indent$}{} {}",
        "",
        node.name().unwrap_or("-"),
        node.fields().labels,
        indent = depth * 2
    );
    for child in node.children() {
        print_tree(child, depth + 1);
    }
}

#[cfg(test)]
#[path = "tests/commands_tests.rs"]
mod tests;
