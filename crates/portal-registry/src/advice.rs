//! Static advisory content for the next-steps endpoint.
//!
//! All guidance lives in const tables; adding a language or team is a
//! data edit.

use portal_types::{NextSteps, Service, ServiceInfo};
use std::collections::BTreeMap;

const BASE_STEPS: &[&str] = &[
    "Review service documentation and API contracts",
    "Set up monitoring and alerting for your service",
    "Configure CI/CD pipeline for automated deployments",
];

struct LanguageGuide {
    language: &'static str,
    steps: &'static [&'static str],
    templates: &'static [(&'static str, &'static str)],
}

const LANGUAGE_GUIDES: &[LanguageGuide] = &[
    LanguageGuide {
        language: "python",
        steps: &[
            "Set up Python virtual environment and dependencies",
            "Configure pytest for unit testing",
            "Add mypy for type checking",
            "Set up pre-commit hooks for code quality",
        ],
        templates: &[
            (
                "Python CI/CD Template",
                "https://github.com/example/python-cicd-template",
            ),
            (
                "Python Dockerfile",
                "https://github.com/example/python-dockerfile-template",
            ),
            (
                "FastAPI Template",
                "https://github.com/example/fastapi-template",
            ),
        ],
    },
    LanguageGuide {
        language: "javascript",
        steps: &[
            "Set up npm scripts for testing and building",
            "Configure Jest for unit testing",
            "Add ESLint and Prettier for code quality",
            "Set up Husky for git hooks",
        ],
        templates: &[
            (
                "Node.js CI/CD Template",
                "https://github.com/example/nodejs-cicd-template",
            ),
            (
                "Node.js Dockerfile",
                "https://github.com/example/nodejs-dockerfile-template",
            ),
            (
                "Express.js Template",
                "https://github.com/example/express-template",
            ),
        ],
    },
    LanguageGuide {
        language: "typescript",
        steps: &[
            "Configure TypeScript compilation settings",
            "Set up Jest with ts-jest for testing",
            "Add ESLint and Prettier with TypeScript rules",
            "Configure path mapping for clean imports",
        ],
        templates: &[
            (
                "TypeScript Node.js Template",
                "https://github.com/example/typescript-node-template",
            ),
            (
                "NestJS Template",
                "https://github.com/example/nestjs-template",
            ),
        ],
    },
    LanguageGuide {
        language: "java",
        steps: &[
            "Configure Maven or Gradle build system",
            "Set up JUnit for testing",
            "Add SpotBugs for static analysis",
            "Configure Checkstyle for code formatting",
        ],
        templates: &[
            (
                "Java CI/CD Template",
                "https://github.com/example/java-cicd-template",
            ),
            (
                "Spring Boot Template",
                "https://github.com/example/spring-boot-template",
            ),
            (
                "Java Dockerfile",
                "https://github.com/example/java-dockerfile-template",
            ),
        ],
    },
    LanguageGuide {
        language: "go",
        steps: &[
            "Set up Go modules and dependency management",
            "Configure go test for unit testing",
            "Add golangci-lint for code quality",
            "Set up go generate for code generation",
        ],
        templates: &[
            (
                "Go CI/CD Template",
                "https://github.com/example/go-cicd-template",
            ),
            (
                "Go Service Template",
                "https://github.com/example/go-service-template",
            ),
            (
                "Go Dockerfile",
                "https://github.com/example/go-dockerfile-template",
            ),
        ],
    },
    LanguageGuide {
        language: "rust",
        steps: &[
            "Set up Cargo.toml with proper dependencies",
            "Configure cargo test for unit testing",
            "Add clippy for linting",
            "Set up rustfmt for code formatting",
        ],
        templates: &[
            (
                "Rust CI/CD Template",
                "https://github.com/example/rust-cicd-template",
            ),
            (
                "Rust Service Template",
                "https://github.com/example/rust-service-template",
            ),
        ],
    },
];

const UNDEPLOYED_STEPS: &[&str] = &[
    "Prepare your first deployment with version tagging",
    "Set up staging environment for testing",
    "Create deployment runbook and rollback procedures",
];

const DEPLOYED_STEPS: &[&str] = &[
    "Monitor deployment metrics and logs",
    "Set up automated rollback procedures",
    "Plan for blue-green deployments",
];

const TEAM_RECOMMENDATIONS: &[(&str, &[&str])] = &[
    (
        "identity-team",
        &[
            "Review OAuth 2.0 and security best practices",
            "Set up rate limiting",
        ],
    ),
    (
        "data-team",
        &[
            "Configure data retention policies",
            "Set up data quality monitoring",
        ],
    ),
    (
        "platform-team",
        &["Review platform SLAs", "Set up cross-service monitoring"],
    ),
    (
        "communications-team",
        &[
            "Set up message delivery tracking",
            "Configure retry policies",
        ],
    ),
];

const COMMON_TEMPLATES: &[(&str, &str)] = &[
    (
        "Service Documentation Template",
        "https://github.com/example/service-docs-template",
    ),
    (
        "Monitoring Setup Guide",
        "https://github.com/example/monitoring-guide",
    ),
    (
        "Security Checklist",
        "https://github.com/example/security-checklist",
    ),
    (
        "Load Testing Guide",
        "https://github.com/example/load-testing-guide",
    ),
];

/// Assemble the advisory payload for a service: baseline steps, then
/// language guidance, then the deployment branch, then team tips.
pub fn next_steps_for(service: &Service) -> NextSteps {
    let mut steps: Vec<String> = BASE_STEPS.iter().map(|s| s.to_string()).collect();
    let mut templates: BTreeMap<String, String> = BTreeMap::new();

    let language = service.language.to_lowercase();
    if let Some(guide) = LANGUAGE_GUIDES.iter().find(|g| g.language == language) {
        steps.extend(guide.steps.iter().map(|s| s.to_string()));
        for (name, url) in guide.templates {
            templates.insert(name.to_string(), url.to_string());
        }
    }

    match service.deployed_version {
        None => steps.extend(UNDEPLOYED_STEPS.iter().map(|s| s.to_string())),
        Some(ref version) => {
            steps.extend(DEPLOYED_STEPS.iter().map(|s| s.to_string()));
            steps.push(format!("Consider upgrading from {}", version));
        }
    }

    if let Some((_, tips)) = TEAM_RECOMMENDATIONS
        .iter()
        .find(|(team, _)| *team == service.owner)
    {
        steps.extend(tips.iter().map(|s| s.to_string()));
    }

    for (name, url) in COMMON_TEMPLATES {
        templates.insert(name.to_string(), url.to_string());
    }

    NextSteps {
        service_name: service.name.clone(),
        next_steps: steps,
        templates,
        service_info: ServiceInfo {
            owner: service.owner.clone(),
            language: service.language.clone(),
            deployed_version: service.deployed_version.clone(),
            deployed_at: service.deployed_at.clone(),
            tags: service.tags.clone(),
            description: service.description.clone(),
        },
    }
}
