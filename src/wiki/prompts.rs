//! Generation Prompts
//!
//! Prompt builders for every chat call the client makes: structure planning,
//! page content, slide outline, individual slides and the workshop.

use crate::constants::generation::{COMPREHENSIVE_PAGES, CONCISE_PAGES};
use crate::host::RepoSnapshot;
use crate::types::{Language, PagePlan, RepositorySpec};

// =============================================================================
// Structure Planning
// =============================================================================

const COMPREHENSIVE_FORMAT: &str = r#"Organise the wiki into sections such as:
- Overview (what the project is for)
- System Architecture (how it is put together)
- Core Features (key functionality)
- Data Management/Flow (storage, pipelines, state), if applicable
- Frontend Components (UI), if applicable
- Backend Systems (server side)
- Model Integration (AI model connections), if applicable
- Deployment/Infrastructure
- Extensibility and Customization (plugins, hooks), if supported

Every section lists the pages it contains and may nest subsections.

<wiki_structure>
  <title>[Overall title for the wiki]</title>
  <description>[Brief description of the repository]</description>
  <sections>
    <section id="section-1">
      <title>[Section title]</title>
      <pages>
        <page_ref>page-1</page_ref>
      </pages>
      <subsections>
        <section_ref>section-2</section_ref>
      </subsections>
    </section>
  </sections>
  <pages>
    <page id="page-1">
      <title>[Page title]</title>
      <description>[What this page covers]</description>
      <importance>high|medium|low</importance>
      <relevant_files>
        <file_path>[Path to a relevant file]</file_path>
      </relevant_files>
      <related_pages>
        <related>page-2</related>
      </related_pages>
      <parent_section>section-1</parent_section>
    </page>
  </pages>
</wiki_structure>"#;

const CONCISE_FORMAT: &str = r#"<wiki_structure>
  <title>[Overall title for the wiki]</title>
  <description>[Brief description of the repository]</description>
  <pages>
    <page id="page-1">
      <title>[Page title]</title>
      <description>[What this page covers]</description>
      <importance>high|medium|low</importance>
      <relevant_files>
        <file_path>[Path to a relevant file]</file_path>
      </relevant_files>
      <related_pages>
        <related>page-2</related>
      </related_pages>
    </page>
  </pages>
</wiki_structure>"#;

/// Ask for an XML wiki structure from the file tree and README
pub fn structure_prompt(
    repo: &RepositorySpec,
    snapshot: &RepoSnapshot,
    language: &Language,
    comprehensive: bool,
) -> String {
    let (format, page_count, flavour) = if comprehensive {
        (COMPREHENSIVE_FORMAT, COMPREHENSIVE_PAGES, "comprehensive")
    } else {
        (CONCISE_FORMAT, CONCISE_PAGES, "concise")
    };

    format!(
        r##"Analyze the repository {owner}/{repo} and design a wiki for it.

<file_tree>
{file_tree}
</file_tree>

<readme>
{readme}
</readme>

The wiki content will be written in {language}.

Favour pages that benefit from diagrams: architecture overviews, data flows,
component relationships, process workflows, state machines and class
hierarchies.

{format}

<OUTPUT_REQUIREMENTS>
- Create {page_count} pages for a {flavour} wiki of this repository
- Each page focuses on one aspect of the codebase
- relevant_files must be real paths from the file tree above
- Return ONLY the XML, starting with <wiki_structure> and ending with </wiki_structure>
- Do not wrap the XML in code fences and do not add any commentary
</OUTPUT_REQUIREMENTS>"##,
        owner = repo.owner,
        repo = repo.repo,
        file_tree = snapshot.file_tree,
        readme = snapshot.readme,
        language = language.display_name(),
        format = format,
        page_count = page_count,
        flavour = flavour,
    )
}

// =============================================================================
// Page Content
// =============================================================================

/// Ask for the Markdown body of one wiki page
pub fn page_prompt(page: &PagePlan, language: &Language) -> String {
    let sources = page
        .file_paths
        .iter()
        .map(|path| format!("- [{path}]({path})"))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        r##"<ROLE>
You are an expert technical writer and software architect writing one page of
a technical wiki in Markdown. The page topic is "{title}".
</ROLE>

<SOURCES>
Use these files as the basis for the page. Cite at least five source files;
look up related files when fewer are listed.
{sources}
</SOURCES>

<STRUCTURE>
1. Begin with a <details> block (summary "Relevant source files") that lists
   every file used, before anything else
2. Then the H1 heading: # {title}
3. A short introduction to the purpose and scope of "{title}"
4. H2/H3 sections covering architecture, components, data flow and key
   functions, classes, endpoints or configuration
5. Mermaid diagrams (graph TD, sequenceDiagram, classDiagram, erDiagram),
   always top-down, with short node labels
6. Markdown tables for features, parameters, options and data fields
7. Short code snippets taken from the sources
8. A closing summary when it helps
</STRUCTURE>

<CITATIONS>
After every paragraph, diagram, table or snippet add
`Sources: [file.ext:start-end]()` naming the files and lines it came from.
</CITATIONS>

Derive everything from the source files; leave out what they do not show.
Write the page in {language}."##,
        title = page.title,
        sources = sources,
        language = language.display_name(),
    )
}

// =============================================================================
// Slides
// =============================================================================

/// Ask for a numbered slide outline
pub fn slide_plan_prompt(repo: &RepositorySpec, digest: &str) -> String {
    format!(
        r##"Create an engaging outline for a polished slide presentation about the {owner}/{repo} repository.

Based on this wiki content:
{digest}

Give a numbered list of 7-8 slide titles, each followed by a colon and a
one-line description. Favour value propositions, distinctive capabilities,
real-world applications and ideas that can be shown visually, over generic
titles like "Introduction" or "Features"."##,
        owner = repo.owner,
        repo = repo.repo,
        digest = digest,
    )
}

/// Ask for the HTML of one slide
pub fn slide_prompt(
    repo: &RepositorySpec,
    title: &str,
    description: &str,
    number: usize,
    total: usize,
    digest: &str,
) -> String {
    let cover = if description.is_empty() {
        String::new()
    } else {
        format!("The slide should cover: {}\n", description)
    };

    format!(
        r##"Create a single HTML slide about the {owner}/{repo} repository titled "{title}".

This is slide {number} of {total}.
{cover}
Reference material from the wiki:
{digest}

<LAYOUT>
- 16:9 landscape; everything fits without scrolling
- Dark theme with gradients, clear visual hierarchy
- Two or three columns via grid or flexbox
- At most 4-5 concise bullet points
- Font Awesome icons are available
</LAYOUT>

Start from this skeleton and adapt it freely:

<div class="slide">
    <div class="content">
        <div class="slide-header">
            <h1 class="main-title">{title}</h1>
        </div>
        <div class="slide-body">
            <div class="left-column"></div>
            <div class="right-column"></div>
        </div>
    </div>
</div>
<style>
    .slide {{ width: 100%; height: 100%; background: linear-gradient(135deg, #0d1117 0%, #161b22 100%); color: #e6edf3; }}
</style>

Return ONLY the raw HTML for the slide, without Markdown or code fences."##,
        owner = repo.owner,
        repo = repo.repo,
        title = title,
        number = number,
        total = total,
        cover = cover,
        digest = digest,
    )
}

// =============================================================================
// Workshop
// =============================================================================

/// Ask for a hands-on Markdown workshop
pub fn workshop_prompt(repo: &RepositorySpec, digest: &str, language: &Language) -> String {
    format!(
        r##"Create a hands-on workshop for learning to use and contribute to the {owner}/{repo} repository.

Information from the project's wiki:
{digest}

Format the workshop in Markdown:

# {repo} Workshop

## Introduction
- Project overview, what participants will learn, prerequisites and setup

## Exercise 1: [First core concept]
- Explanation, step-by-step instructions, expected outcome
- A challenge, and the solution inside a <details> block

(at least three exercises, each building on the previous one)

## Final Project
- A culminating exercise with success criteria and a solution

## Next Steps
- Further learning, how to contribute, additional resources

Every exercise must use real code and real features of {repo}. Use code
blocks with language tags, Mermaid diagrams where they clarify a flow, and
tables for comparisons. Write the workshop in {language}."##,
        owner = repo.owner,
        repo = repo.repo,
        digest = digest,
        language = language.display_name(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{HostType, Importance};

    fn repo() -> RepositorySpec {
        RepositorySpec::new("octo", "engine", HostType::Github)
    }

    #[test]
    fn test_structure_prompt_modes() {
        let snapshot = RepoSnapshot {
            file_tree: "src/main.rs\nCargo.toml".into(),
            readme: "# Engine".into(),
        };
        let comprehensive = structure_prompt(&repo(), &snapshot, &Language::new("ja"), true);
        assert!(comprehensive.contains("src/main.rs\nCargo.toml"));
        assert!(comprehensive.contains("<sections>"));
        assert!(comprehensive.contains("Create 8-12 pages"));
        assert!(comprehensive.contains("Japanese"));

        let concise = structure_prompt(&repo(), &snapshot, &Language::default(), false);
        assert!(!concise.contains("<sections>"));
        assert!(concise.contains("Create 4-6 pages"));
    }

    #[test]
    fn test_page_prompt_lists_sources() {
        let page = PagePlan {
            id: "page-1".into(),
            title: "Query Planner".into(),
            importance: Importance::High,
            file_paths: vec!["src/plan.rs".into(), "src/exec.rs".into()],
            related_pages: vec![],
        };
        let prompt = page_prompt(&page, &Language::default());
        assert!(prompt.contains("- [src/plan.rs](src/plan.rs)\n- [src/exec.rs](src/exec.rs)"));
        assert!(prompt.contains("# Query Planner"));
        assert!(prompt.contains("Write the page in English."));
    }

    #[test]
    fn test_slide_prompt_description_optional() {
        let with = slide_prompt(&repo(), "Speed", "Benchmarks", 2, 7, "digest");
        assert!(with.contains("The slide should cover: Benchmarks"));
        assert!(with.contains("slide 2 of 7"));
        let without = slide_prompt(&repo(), "Speed", "", 2, 7, "digest");
        assert!(!without.contains("should cover"));
    }
}
