use anyhow::Context;
use loom_core::{
    config::Config,
    io, paths,
    registry::Registry,
    role::RoleGraph,
    state::State,
};
use std::path::Path;

// ---------------------------------------------------------------------------
// Starter knowledge
// ---------------------------------------------------------------------------

const KNOWLEDGE_APP_SERVICE: &str = r#"---
topic: service-patterns
title: App Service Hosting
tags: [app-service, hosting]
---
Host the web tier on {{ref:app-service}} with a system-assigned managed
identity. Application settings reference secrets in {{ref:key-vault}}
through Key Vault references, never as literal values. Telemetry flows to
{{ref:app-insights}} via the connection string app setting.
"#;

const KNOWLEDGE_TERRAFORM: &str = r#"---
topic: iac
title: Terraform
tags: [terraform]
---
Infrastructure is declared with Terraform using the `azurerm` provider.
State lives in a storage account created once per subscription.

```hcl
resource "azurerm_resource_group" "main" {
  name     = "rg-[PROJECT_NAME]"
  location = var.location
}
```

Run `terraform plan` before every apply and keep the plan output with the
change record.
"#;

const KNOWLEDGE_MANAGED_IDENTITY: &str = r#"---
topic: auth
title: Managed Identity
---
Services authenticate to each other with managed identities. No client
secrets are stored in application configuration.
"#;

const KNOWLEDGE_AUTH_PYTHON: &str = r#"---
topic: auth
title: Python Authentication
languages: [python]
---
```python
from azure.identity import DefaultAzureCredential

# Picks up the managed identity in Azure and the developer login locally.
credential = DefaultAzureCredential()
```
"#;

const KNOWLEDGE_NAMING: &str = r#"---
topic: governance
title: Naming and Tagging
---
Resource names follow `<type>-<workload>-<environment>`. Every resource
carries `owner`, `environment` and `cost-center` tags.
"#;

const KNOWLEDGE: &[(&str, &str)] = &[
    ("services/app-service.md", KNOWLEDGE_APP_SERVICE),
    ("tools/terraform.md", KNOWLEDGE_TERRAFORM),
    ("auth/managed-identity.md", KNOWLEDGE_MANAGED_IDENTITY),
    ("auth/python.md", KNOWLEDGE_AUTH_PYTHON),
    ("governance/naming.md", KNOWLEDGE_NAMING),
];

// ---------------------------------------------------------------------------
// Role templates
// ---------------------------------------------------------------------------

const TEMPLATE_ANALYST: &str = r#"---
description: Business problem and requirements
optional_placeholders: [PROJECT_DESCRIPTION]
---
# [PROJECT_NAME]: Requirements

## Problem Statement

[PROJECT_DESCRIPTION]

## Functional Requirements

- Capture the user journeys the prototype must demonstrate.

## Non-Functional Requirements

- Prototype scope, single region, no production data.
"#;

const TEMPLATE_ARCHITECT: &str = r#"---
description: Solution shape and chosen services
---
# [PROJECT_NAME]: Architecture

## Requirements Input

~~~markdown
[ANALYST_OUTPUT]
~~~

## Services

- {{ref:app-service}} hosts the web front end.
- {{ref:key-vault}} holds secrets.
- {{ref:app-insights}} collects telemetry.

## RBAC Roles

- Key Vault Secrets User for the web app's managed identity.

## Service Patterns

<!-- fragment:service-patterns -->
"#;

const TEMPLATE_INFRASTRUCTURE: &str = r#"---
description: Infrastructure as code for the chosen services
---
# [PROJECT_NAME]: Infrastructure

## Target Services

[SERVICES]

## Resources

- Resource group `rg-[PROJECT_NAME]`
- One resource per target service, named `<service>-[PROJECT_NAME]`

## Infrastructure as Code

<!-- fragment:iac -->
"#;

const TEMPLATE_DEVELOPER: &str = r#"---
description: Application code against the provisioned resources
---
# [PROJECT_NAME]: Implementation

## Services Consumed

[SERVICES]

## Provisioned Resources

[RESOURCES]

## Authentication

<!-- fragment:auth -->

## Implementation Notes

- Read configuration from environment variables set by the infrastructure outputs.
"#;

const TEMPLATE_SECURITY: &str = r#"---
description: Identity, secrets and access review
---
# [PROJECT_NAME]: Security Review

## Identity and Access

[RBAC_ROLES]

## Secrets

- All secrets live in {{ref:key-vault}}; no connection strings in app settings.

## Governance

<!-- fragment:governance -->

## Findings

- [ ] Managed identity enabled on every compute resource.
"#;

const TEMPLATE_QA: &str = r#"---
description: Test plan for the prototype
---
# [PROJECT_NAME]: Test Plan

## Scope

Covers the implementation described by the developer stage.

## Test Cases

| Area | Case | Expected |
|------|------|----------|
| Auth | Call the API without a token | 401 |

## Exit Criteria

- All test cases pass in the prototype environment.
"#;

const TEMPLATES: &[(&str, &str)] = &[
    ("roles/analyst.md", TEMPLATE_ANALYST),
    ("roles/architect.md", TEMPLATE_ARCHITECT),
    ("roles/infrastructure.md", TEMPLATE_INFRASTRUCTURE),
    ("roles/developer.md", TEMPLATE_DEVELOPER),
    ("roles/security.md", TEMPLATE_SECURITY),
    ("roles/qa.md", TEMPLATE_QA),
];

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

pub fn run(root: &Path, name: Option<&str>, languages: &[String]) -> anyhow::Result<()> {
    let project_name = name.map(str::to_string).unwrap_or_else(|| {
        root.file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "project".to_string())
    });

    println!("Initializing loom in: {}", root.display());

    let loom_dir = paths::loom_dir(root);
    io::ensure_dir(&loom_dir)
        .with_context(|| format!("failed to create {}", loom_dir.display()))?;

    // 1. config.yaml
    let config = if paths::config_path(root).exists() {
        println!("  exists:  {}", paths::CONFIG_FILE);
        Config::load(root).context("failed to load config")?
    } else {
        let mut cfg = Config::new(&project_name);
        cfg.project.languages = languages.to_vec();
        cfg.save(root).context("failed to write config.yaml")?;
        println!("  created: {}", paths::CONFIG_FILE);
        cfg
    };

    // 2. state.yaml
    if paths::state_path(root).exists() {
        println!("  exists:  {}", paths::STATE_FILE);
    } else {
        State::new(&config.project.name)
            .save(root)
            .context("failed to write state.yaml")?;
        println!("  created: {}", paths::STATE_FILE);
    }

    // 3. roles.yaml and registry.yaml
    if paths::roles_path(root).exists() {
        println!("  exists:  {}", paths::ROLES_FILE);
    } else {
        RoleGraph::default_pipeline()
            .save(&paths::roles_path(root))
            .context("failed to write roles.yaml")?;
        println!("  created: {}", paths::ROLES_FILE);
    }
    if paths::registry_path(root).exists() {
        println!("  exists:  {}", paths::REGISTRY_FILE);
    } else {
        Registry::starter()
            .save(&paths::registry_path(root))
            .context("failed to write registry.yaml")?;
        println!("  created: {}", paths::REGISTRY_FILE);
    }

    // 4. Starter knowledge and templates, never overwriting edits.
    write_tree(&config.knowledge_dir(root), &config.paths.knowledge, KNOWLEDGE)?;
    write_tree(&config.templates_dir(root), &config.paths.templates, TEMPLATES)?;
    io::ensure_dir(&config.output_dir(root))?;

    println!("\nNext: loom run");
    Ok(())
}

fn write_tree(dir: &Path, label: &str, files: &[(&str, &str)]) -> anyhow::Result<()> {
    for (rel, content) in files {
        let path = dir.join(rel);
        let created = io::write_if_missing(&path, content.as_bytes())
            .with_context(|| format!("failed to write {}", path.display()))?;
        let status = if created { "created:" } else { "exists: " };
        println!("  {status} {label}/{rel}");
    }
    Ok(())
}
