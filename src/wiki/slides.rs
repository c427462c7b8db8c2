//! Slide decks built from a cached wiki.
//!
//! One outline call, then one call per slide, strictly in order. A slide
//! call that fails aborts the deck.

use tracing::{debug, info, instrument, warn};

use super::digest::build_digest;
use super::prompts;
use crate::backend::CachedWiki;
use crate::config::GenerationConfig;
use crate::extract::{
    FragmentSource, PlanSource, extract_html_fragment, extract_plan_list, has_own_styling,
};
use crate::transport::{ChatRequest, SharedTransport, fetch_text};
use crate::types::{Language, RepositorySpec, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Slide {
    pub number: usize,
    pub title: String,
    pub description: String,
    pub html: String,
    pub source: FragmentSource,
    /// Wrapped in the default slide template
    pub templated: bool,
}

impl Slide {
    pub fn id(&self) -> String {
        format!("slide-{}", self.number)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlideDeck {
    pub repo: String,
    pub language: String,
    pub plan_source: PlanSource,
    pub slides: Vec<Slide>,
}

/// Progress callbacks while a deck is generated
#[derive(Debug, Clone, Copy)]
pub enum SlideProgress<'a> {
    Planned { total: usize },
    Started { number: usize, total: usize, title: &'a str },
    Finished { number: usize, total: usize },
}

pub struct SlideGenerator {
    transport: SharedTransport,
    generation: GenerationConfig,
}

impl SlideGenerator {
    pub fn new(transport: SharedTransport, generation: GenerationConfig) -> Self {
        Self {
            transport,
            generation,
        }
    }

    #[instrument(skip_all, fields(repo = %repo.key()))]
    pub async fn generate<F>(
        &self,
        repo: &RepositorySpec,
        wiki: &CachedWiki,
        language: &Language,
        mut on_progress: F,
    ) -> Result<SlideDeck>
    where
        F: FnMut(SlideProgress<'_>),
    {
        let digest = build_digest(wiki);
        debug!("Wiki digest: {} chars", digest.chars().count());

        let plan_request = ChatRequest::new(repo, prompts::slide_plan_prompt(repo, &digest))
            .with_generation(&self.generation, language);
        let outline = fetch_text(self.transport.as_ref(), &plan_request).await?;
        let plan = extract_plan_list(&outline, &repo.repo);
        let total = plan.entries.len();
        info!("Slide outline: {} slides ({:?})", total, plan.source);
        on_progress(SlideProgress::Planned { total });

        let mut slides = Vec::with_capacity(total);
        for (index, entry) in plan.entries.iter().enumerate() {
            let number = index + 1;
            on_progress(SlideProgress::Started {
                number,
                total,
                title: &entry.title,
            });

            let prompt = prompts::slide_prompt(
                repo,
                &entry.title,
                &entry.description,
                number,
                total,
                &digest,
            );
            let request =
                ChatRequest::new(repo, prompt).with_generation(&self.generation, language);
            let reply = fetch_text(self.transport.as_ref(), &request)
                .await
                .inspect_err(|e| warn!("Slide {} failed: {}", number, e))?;

            let fragment = extract_html_fragment(&reply);
            let templated = !has_own_styling(&fragment.html);
            let html = if templated {
                apply_default_template(&entry.title, &fragment.html)
            } else {
                fragment.html
            };

            slides.push(Slide {
                number,
                title: entry.title.clone(),
                description: entry.description.clone(),
                html,
                source: fragment.source,
                templated,
            });
            on_progress(SlideProgress::Finished { number, total });
        }

        Ok(SlideDeck {
            repo: repo.repo.clone(),
            language: language.code().to_string(),
            plan_source: plan.source,
            slides,
        })
    }
}

// =============================================================================
// HTML
// =============================================================================

const SLIDE_TEMPLATE: &str = r##"
<div class="slide">
    <div class="code-pattern"></div>
    <div class="accent-glow"></div>

    <div class="content">
        <div class="slide-header">
            <h1 class="main-title">%TITLE%</h1>
        </div>

        <div class="slide-body">
            <div class="left-column">
                <div class="slide-content">
                    %CONTENT%
                </div>
            </div>
            <div class="right-column">
                <div class="visual-content">
                    <i class="fas fa-code fa-5x" style="opacity: 0.3; color: #58a6ff; margin: 2rem auto; display: block; text-align: center;"></i>
                </div>
            </div>
        </div>
    </div>
</div>
<style>
    .slide {
        width: 100%;
        height: 100%;
        position: relative;
        overflow: hidden;
        font-family: 'Segoe UI', Tahoma, Geneva, Verdana, sans-serif;
        color: #e6edf3;
        background: linear-gradient(135deg, #0d1117 0%, #161b22 100%);
        display: flex;
        flex-direction: column;
    }
    .code-pattern {
        position: absolute;
        width: 100%;
        height: 100%;
        opacity: 0.2;
        z-index: 0;
    }
    .accent-glow {
        position: absolute;
        width: 600px;
        height: 600px;
        border-radius: 50%;
        background: radial-gradient(circle, rgba(88, 166, 255, 0.1) 0%, rgba(88, 166, 255, 0) 70%);
        top: -200px;
        right: -100px;
        z-index: 1;
    }
    .content {
        z-index: 2;
        position: relative;
        height: 100%;
        padding: 40px 60px;
        display: flex;
        flex-direction: column;
    }
    .slide-header { margin-bottom: 30px; }
    .slide-body { display: flex; flex: 1; gap: 40px; align-items: flex-start; }
    .left-column, .right-column { flex: 1; display: flex; flex-direction: column; }
    .main-title {
        font-size: 3.5rem;
        font-weight: 700;
        background: linear-gradient(135deg, #58a6ff 0%, #8957e5 100%);
        -webkit-background-clip: text;
        background-clip: text;
        -webkit-text-fill-color: transparent;
        line-height: 1.1;
        margin-bottom: 10px;
    }
    .slide-content { font-size: 1.5rem; color: #e6edf3; line-height: 1.5; display: flex; flex-direction: column; }
    .slide-content ul, .slide-content ol { margin: 0.5em 0; padding-left: 1.5em; }
    .slide-content li { margin-bottom: 0.5em; }
    .slide-content pre, .slide-content code { max-width: 100%; overflow-x: auto; white-space: pre-wrap; font-size: 1.2rem; }
    .text-accent-blue { color: #58a6ff; }
    .text-accent-purple { color: #8957e5; }
    .text-accent-green { color: #3fb950; }
    .text-accent-orange { color: #f0883e; }
</style>
<link rel="stylesheet" href="https://cdn.jsdelivr.net/npm/@fortawesome/fontawesome-free@6.4.0/css/all.min.css">
"##;

/// Wrap an unstyled fragment in the default dark two-column slide
pub fn apply_default_template(title: &str, html: &str) -> String {
    SLIDE_TEMPLATE
        .replace("%TITLE%", title)
        .replace("%CONTENT%", html)
}

const DECK_STYLE: &str = r##"  <link rel="stylesheet" href="https://cdn.jsdelivr.net/npm/@fortawesome/fontawesome-free@6.4.0/css/all.min.css">
  <script src="https://cdn.jsdelivr.net/npm/mermaid@10.0.0/dist/mermaid.min.js"></script>
  <style>
    body { font-family: 'Segoe UI', Tahoma, Geneva, Verdana, sans-serif; margin: 0; padding: 0; background-color: #0d1117; color: #e6edf3; }
    .slide-container { max-width: 1280px; height: 720px; margin: 2rem auto; page-break-after: always; position: relative; overflow: hidden; box-shadow: 0 10px 30px rgba(0, 0, 0, 0.5); border-radius: 8px; }
    .nav-controls { position: fixed; bottom: 20px; left: 50%; transform: translateX(-50%); display: flex; gap: 20px; z-index: 1000; background: rgba(13, 17, 23, 0.8); padding: 10px 20px; border-radius: 30px; }
    .nav-btn { color: #58a6ff; cursor: pointer; font-size: 18px; }
    .slide-indicator { display: flex; align-items: center; color: #8b949e; font-size: 14px; }
    @media print {
      .slide-container { margin: 0; height: 100vh; box-shadow: none; border-radius: 0; }
      .nav-controls { display: none; }
    }
  </style>
"##;

const DECK_SCRIPT: &str = r##"  <script>
    let currentSlide = 1;
    const slideContainers = document.querySelectorAll('.slide-container');
    const totalSlides = slideContainers.length;
    function showSlide(n) {
      slideContainers.forEach((slide, index) => {
        slide.style.display = index + 1 === n ? 'block' : 'none';
      });
      document.getElementById('current-slide').textContent = n;
    }
    function nextSlide() { if (currentSlide < totalSlides) { currentSlide++; showSlide(currentSlide); } }
    function prevSlide() { if (currentSlide > 1) { currentSlide--; showSlide(currentSlide); } }
    document.addEventListener('keydown', (e) => {
      if (e.key === 'ArrowRight' || e.key === ' ') { nextSlide(); }
      else if (e.key === 'ArrowLeft') { prevSlide(); }
    });
    window.onload = function () {
      showSlide(1);
      if (typeof mermaid !== 'undefined') {
        mermaid.initialize({ theme: 'dark', securityLevel: 'loose', startOnLoad: true });
      }
    };
  </script>
"##;

impl SlideDeck {
    pub fn filename(&self) -> String {
        format!("{}_slides.html", self.repo)
    }

    /// Standalone presentation document with keyboard navigation
    pub fn to_html(&self) -> String {
        let mut html = String::new();
        html.push_str("<!DOCTYPE html>\n");
        html.push_str(&format!("<html lang=\"{}\">\n<head>\n", self.language));
        html.push_str("  <meta charset=\"UTF-8\">\n");
        html.push_str(
            "  <meta name=\"viewport\" content=\"width=device-width, initial-scale=1.0\">\n",
        );
        html.push_str(&format!("  <title>{} Slides</title>\n", self.repo));
        html.push_str(DECK_STYLE);
        html.push_str("</head>\n<body>\n");

        for slide in &self.slides {
            html.push_str(&format!(
                "  <div class=\"slide-container\" id=\"{}\">{}</div>\n",
                slide.id(),
                slide.html
            ));
        }

        html.push_str(&format!(
            r#"  <div class="nav-controls">
    <div class="nav-btn" onclick="prevSlide()"><i class="fas fa-chevron-left"></i></div>
    <div class="slide-indicator"><span id="current-slide">1</span>/<span id="total-slides">{}</span></div>
    <div class="nav-btn" onclick="nextSlide()"><i class="fas fa-chevron-right"></i></div>
  </div>
"#,
            self.slides.len()
        ));
        html.push_str(DECK_SCRIPT);
        html.push_str("</body>\n</html>\n");
        html
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::CacheQuery;
    use crate::test_support::{Reply, ScriptedTransport};
    use crate::types::{
        GeneratedPage, HostType, Importance, PageMap, PagePlan, PageStatus, StructurePlan,
        WikiError,
    };
    use std::sync::Arc;

    fn repo() -> RepositorySpec {
        RepositorySpec::new("octo", "engine", HostType::Github)
    }

    fn wiki() -> CachedWiki {
        let plan = PagePlan {
            id: "page-1".into(),
            title: "Overview".into(),
            importance: Importance::High,
            file_paths: vec![],
            related_pages: vec![],
        };
        let mut pages = PageMap::new();
        pages.insert(
            "page-1".into(),
            GeneratedPage {
                plan: plan.clone(),
                content: "# Overview\nThe engine schedules work.".into(),
                status: PageStatus::Done,
            },
        );
        let structure = StructurePlan {
            title: "Engine".into(),
            description: "A scheduling engine".into(),
            pages: vec![plan],
            ..Default::default()
        };
        CachedWiki::new(&CacheQuery::new(&repo(), &Language::default(), true), structure, pages)
    }

    fn is_outline(request: &ChatRequest) -> bool {
        request.messages[0].content.contains("numbered list")
    }

    #[tokio::test]
    async fn test_generates_slides_in_order() {
        let transport = ScriptedTransport::new(|request| {
            let prompt = &request.messages[0].content;
            if is_outline(request) {
                Reply::text("1. Vision: why it exists\n2. Engine: how it runs")
            } else if prompt.contains("slide 1 of 2") {
                Reply::text("Here you go:\n```html\n<div class=\"slide\">Vision</div>\n<style>.slide { color: red; }</style>\n```")
            } else {
                Reply::text("<ul><li>Queue</li></ul>")
            }
        });
        let generator = SlideGenerator::new(transport.clone(), GenerationConfig::default());

        let mut notices = Vec::new();
        let deck = generator
            .generate(&repo(), &wiki(), &Language::default(), |p| {
                if let SlideProgress::Finished { number, total } = p {
                    notices.push((number, total));
                }
            })
            .await
            .unwrap();

        assert_eq!(deck.plan_source, PlanSource::NumberedDot);
        assert_eq!(deck.slides.len(), 2);
        assert_eq!(notices, vec![(1, 2), (2, 2)]);
        assert_eq!(transport.calls(), 3);
        assert_eq!(transport.peak_concurrency(), 1);

        let first = &deck.slides[0];
        assert_eq!(first.title, "Vision");
        assert_eq!(first.description, "why it exists");
        assert_eq!(first.source, FragmentSource::CodeBlock);
        assert!(!first.templated);
        assert!(first.html.starts_with("<div class=\"slide\">Vision</div>"));

        let second = &deck.slides[1];
        assert!(second.templated);
        assert!(second.html.contains("<h1 class=\"main-title\">Engine</h1>"));
        assert!(second.html.contains("<ul><li>Queue</li></ul>"));

        let outline_prompt = &transport.requests()[0].messages[0].content;
        assert!(outline_prompt.contains("## Project Overview\nA scheduling engine"));
    }

    #[tokio::test]
    async fn test_unparseable_outline_uses_default_plan() {
        let transport = ScriptedTransport::new(|request| {
            if is_outline(request) {
                Reply::text("")
            } else {
                Reply::text("<style>.x{}</style><p>slide</p>")
            }
        });
        let generator = SlideGenerator::new(transport.clone(), GenerationConfig::default());

        let deck = generator
            .generate(&repo(), &wiki(), &Language::default(), |_| {})
            .await
            .unwrap();
        assert_eq!(deck.plan_source, PlanSource::Default);
        assert_eq!(deck.slides.len(), 7);
        assert_eq!(transport.calls(), 8);
    }

    #[tokio::test]
    async fn test_failed_slide_aborts_deck() {
        let transport = ScriptedTransport::new(|request| {
            if is_outline(request) {
                Reply::text("1. One\n2. Two\n3. Three")
            } else if request.messages[0].content.contains("slide 2 of 3") {
                Reply {
                    status: 503,
                    chunks: vec!["overloaded".into()],
                    delay: std::time::Duration::ZERO,
                }
            } else {
                Reply::text("<p>ok</p>")
            }
        });
        let generator = SlideGenerator::new(
            Arc::clone(&transport) as SharedTransport,
            GenerationConfig::default(),
        );

        let err = generator
            .generate(&repo(), &wiki(), &Language::default(), |_| {})
            .await
            .unwrap_err();
        assert!(matches!(err, WikiError::Transport { status: Some(503), .. }));
        assert_eq!(transport.calls(), 3);
    }

    #[test]
    fn test_deck_html_document() {
        let deck = SlideDeck {
            repo: "engine".into(),
            language: "ja".into(),
            plan_source: PlanSource::NumberedDot,
            slides: vec![Slide {
                number: 1,
                title: "Intro".into(),
                description: String::new(),
                html: "<p>hello</p>".into(),
                source: FragmentSource::Raw,
                templated: false,
            }],
        };
        let html = deck.to_html();
        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.contains("<html lang=\"ja\">"));
        assert!(html.contains("<title>engine Slides</title>"));
        assert!(html.contains("<div class=\"slide-container\" id=\"slide-1\"><p>hello</p></div>"));
        assert!(html.contains("<span id=\"total-slides\">1</span>"));
        assert_eq!(deck.filename(), "engine_slides.html");
    }
}
