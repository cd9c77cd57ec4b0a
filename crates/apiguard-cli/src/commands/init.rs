//! Initialize a new API Guard project

use anyhow::Result;
use apiguard_core::config::CONFIG_FILE;
use std::fs;
use std::path::Path;

/// Run the init command
pub async fn run(path: &str, name: Option<&str>) -> Result<()> {
    let project_dir = Path::new(path);

    if !project_dir.exists() {
        fs::create_dir_all(project_dir)?;
    }

    let abs_path = project_dir.canonicalize()?;

    let project_name = match name {
        Some(n) => n.to_string(),
        None => abs_path
            .file_name()
            .and_then(|n| n.to_str())
            .map(|s| s.to_string())
            .ok_or_else(|| anyhow::anyhow!("Could not determine project name from path"))?,
    };

    if project_dir.join(CONFIG_FILE).exists() {
        anyhow::bail!(
            "Directory '{}' already contains an {}",
            project_dir.display(),
            CONFIG_FILE
        );
    }

    tracing::info!("Creating new API Guard project: {}", project_name);

    let config = format!(
        r#"# API Guard Project Configuration
name: {project_name}
version: "0.1.0"

# Interface definition document and compiled output
document: swagger.yaml
output: .apiguard/compiled.json

auth:
  token_header: x-auth-token

# Compile only matching operations ("*" suffix matches a URL prefix)
# filter:
#   interface: /api/pets/*
#   method: get
"#
    );
    fs::write(project_dir.join(CONFIG_FILE), config)?;

    let document = r##"basePath: /api
paths:
  /pets/{petId}:
    get:
      operationId: getPet
      tags: [pet]
      parameters:
        - { name: petId, in: path, type: string, required: true, pattern: "^[0-9]+$" }
        - { name: x-auth-token, in: header, type: string, required: true }
      responses:
        200:
          description: The pet
          schema:
            $ref: "#/definitions/Pet"
  /pets:
    post:
      operationId: addPet
      tags: [pet]
      parameters:
        - name: pet
          in: body
          required: true
          schema:
            $ref: "#/definitions/Pet"
      responses:
        201:
          description: Created
definitions:
  Pet:
    type: object
    required: [name]
    properties:
      name: { type: string, minLength: 1, maxLength: 32 }
      kind:
        $ref: "#/definitions/Kind"
      tags:
        type: array
        maxItems: 5
        items: { type: string, maxLength: 16 }
  Kind:
    type: string
    enum: [cat, dog, bird]
"##;
    fs::write(project_dir.join("swagger.yaml"), document)?;

    fs::create_dir_all(project_dir.join("requests"))?;
    let get_pet = r#"{
  "params": { "petId": "42" },
  "headers": {
    "x-auth-token": "eyJ0b2tlbiI6eyJ1c2VyIjoiZGVtbyIsImV4cGlyZXNfYXQiOiIyOTk5LTEyLTMxVDIzOjU5OjU5WiJ9fQ=="
  }
}
"#;
    fs::write(project_dir.join("requests/get-pet.json"), get_pet)?;

    let add_pet = r#"{
  "body": { "name": "Rex", "kind": "dog", "tags": ["good", "loud"] }
}
"#;
    fs::write(project_dir.join("requests/add-pet.json"), add_pet)?;

    let gitignore = r#"# API Guard compiled output
.apiguard/

# IDE
.idea/
.vscode/
*.swp
"#;
    fs::write(project_dir.join(".gitignore"), gitignore)?;

    tracing::info!("✓ Project created at {}", abs_path.display());
    tracing::info!("");
    tracing::info!("Next steps:");
    if path != "." {
        tracing::info!("  cd {}", path);
    }
    tracing::info!("  apiguard compile");
    tracing::info!("  apiguard check --operation getPet --request requests/get-pet.json");

    Ok(())
}
