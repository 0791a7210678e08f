//! The default documentation pipeline: 13 agents, 19 tasks, 2 exports.
//!
//! requirements -> user story -> PDD -> component map / SDD, each with a
//! review and an update pass, then risk analysis, a flowchart, the combined
//! document, an evaluation, and the two report texts the exports consume.

use crate::agents::{AgentRegistry, AgentSpec};
use crate::export::ExportSpec;
use crate::graph::{TaskGraph, TaskSpec};
use docweave_core::Result;
use std::sync::Arc;

pub const REQUIREMENT_ANALYST: &str = "requirement_analyst";
pub const TECHNICAL_REVIEWER: &str = "technical_reviewer";
pub const FINAL_REVIEWER: &str = "final_reviewer";
pub const BUSINESS_ANALYST: &str = "business_analyst";
pub const PDD_SPECIALIST: &str = "pdd_specialist";
pub const SDD_SPECIALIST: &str = "sdd_specialist";
pub const COMPONENT_MAPPER: &str = "component_mapper";
pub const RISK_ANALYST: &str = "risk_analyst";
pub const FLOWCHART_DESIGNER: &str = "flowchart_designer";
pub const FINAL_WRITER: &str = "final_writer";
pub const EVALUATION_AGENT: &str = "evaluation_agent";
pub const SUMMARY_REPORTER: &str = "summary_report_generator";
pub const FULL_REPORTER: &str = "full_report_generator";

/// Agent specs bound to `model`, in registration order.
pub fn agent_specs(model: &str) -> Vec<AgentSpec> {
    let specs = vec![
        AgentSpec::new(
            REQUIREMENT_ANALYST,
            "Requirement Intake Agent",
            "Refine vague input for {topic} into detailed, structured requirements",
            "An analyst who works with stakeholders to clarify vague or ambiguous requirements.",
        )
        .delegating(true),
        AgentSpec::new(
            TECHNICAL_REVIEWER,
            "Technical Reviewer",
            "Technically review documents based on {topic} and suggest improvements",
            "Reviews technical documents for structure, completeness, and feasibility in the context of {topic}.",
        )
        .delegating(true),
        AgentSpec::new(
            FINAL_REVIEWER,
            "Final Reviewer",
            "Evaluate review quality and apply necessary updates for {topic} if required",
            "A senior reviewer who keeps {topic} documents correct and clear.",
        )
        .delegating(true),
        AgentSpec::new(
            BUSINESS_ANALYST,
            "Business Analyst",
            "Understand the requirement from {topic} and write clear, concise user stories for an agile team",
            "An experienced business analyst who turns business needs into actionable user stories.",
        )
        .delegating(true),
        AgentSpec::new(
            PDD_SPECIALIST,
            "PDD Specialist",
            "Create a Project Design Document from the user story and {topic}",
            "A technical architect responsible for planning and system structure.",
        )
        .delegating(true),
        AgentSpec::new(
            SDD_SPECIALIST,
            "SDD Specialist",
            "Write a detailed System Design Document based on the PDD",
            "A system designer who turns designs into technical documents.",
        )
        .delegating(true),
        AgentSpec::new(
            COMPONENT_MAPPER,
            "Component Mapper",
            "Map suitable technologies to the components of {topic}",
            "Selects technologies that fit each module of {topic}, guided by the PDD and SDD.",
        ),
        AgentSpec::new(
            RISK_ANALYST,
            "Risk Analyst",
            "Identify technical risks in the system for {topic} and propose mitigations",
            "Anticipates and manages risks in {topic} systems so the project succeeds.",
        ),
        AgentSpec::new(
            FLOWCHART_DESIGNER,
            "Flowchart Designer",
            "Produce a clean, minimal Mermaid flowchart of the {topic} system architecture",
            "Draws system flowcharts in Mermaid syntax with only the key modules, simple \
             relationships and high-level interactions. Keeps labels short and flows flat.",
        ),
        AgentSpec::new(
            FINAL_WRITER,
            "Final Writer Agent",
            "Combine the User Story, PDD, and SDD into one comprehensive document",
            "A technical writer who compiles and formats documentation into a cohesive whole.",
        ),
        AgentSpec::new(
            EVALUATION_AGENT,
            "Evaluation Agent",
            "Score the generated documents for {topic} and suggest improvements",
            "A demanding editor who grades technical documents and explains every score.",
        )
        .delegating(true),
        AgentSpec::new(
            SUMMARY_REPORTER,
            "Summary Report Generator",
            "Summarise the system documents for a Word report",
            "A communication expert who turns technical documentation into readable overviews \
             for non-technical readers: key points, rationale and high-level insights, without \
             implementation detail.",
        ),
        AgentSpec::new(
            FULL_REPORTER,
            "Full Word Report Generator",
            "Produce complete, detailed Word report text from the system documents",
            "A technical writer who compiles all finalised documentation into one well-structured \
             report, keeping depth and clarity through proper sectioning.",
        ),
    ];
    specs.into_iter().map(|s| s.on_model(model)).collect()
}

/// Task specs in execution order.
pub fn task_specs() -> Vec<TaskSpec> {
    vec![
        // ── Requirements ──
        TaskSpec::new("requirements", REQUIREMENT_ANALYST, "01_requirements.txt").describe(
            "Take the vague problem statement {topic} and turn it into detailed, clear and \
             structured functional requirements. Your response must have two sections:\n\n\
             1. **Original Client Requirements**: the full original statement of {topic}.\n\
             2. **Refined Functional Requirements**: your rewritten version, organised and clarified.",
            "A markdown document with two sections:\n\n\
             **Original Client Requirements**: (copy of {topic})\n\n\
             **Refined Functional Requirements**: (structured breakdown of clear, detailed requirements)",
        ),
        TaskSpec::new("requirements_review", TECHNICAL_REVIEWER, "01a_requirements_review.txt")
            .after(&["requirements"])
            .describe(
                "Review the requirements document for {topic} for:\n\
                 - Technical clarity and feasibility\n\
                 - Logical structure and testability of each requirement\n\
                 - Completeness against the original client statement\n\n\
                 Write a markdown review report with suggestions for improvement where needed.",
                "Review report with suggestions to improve clarity, feasibility, or completeness.",
            ),
        TaskSpec::new("requirements_update", FINAL_REVIEWER, "01b_requirements_updated.txt")
            .after(&["requirements", "requirements_review"])
            .describe(
                "Update the requirements document for {topic} using the review. Make sure to:\n\
                 - Keep the original problem statement under '## Original Client Requirements'\n\
                 - Address all review feedback under '## Refined Functional Requirements'\n\
                 - Keep the formatting and the ID of each requirement\n\
                 - Leave every requirement implementable and testable",
                "A markdown document with two sections:\n\n\
                 **Original Client Requirements**: (copy of {topic})\n\n\
                 **Refined Functional Requirements**: (updated according to the review)",
            ),
        // ── User story ──
        TaskSpec::new("user_story", BUSINESS_ANALYST, "02_user_story.txt")
            .after(&["requirements_update"])
            .describe(
                "For {topic}, write a fully detailed enterprise-grade user story in agile format, \
                 with these markdown sections in order:\n\
                 - **Title**\n\
                 - **Epic**\n\
                 - **Feature**\n\
                 - **Priority**\n\
                 - **Story Points**\n\
                 - **User Story** (As a [role], I want to [goal], so that [benefit])\n\
                 - **Acceptance Criteria** (grouped by theme, e.g. account creation, privacy, security)\n\
                 - **Functional Requirements Mapping** (FR codes used above with short definitions)\n\
                 - **Definition of Done** (checklist for the story to count as complete)",
                "A markdown user story with all sections above, realistic testable conditions \
                 and strong alignment with enterprise development standards.",
            ),
        TaskSpec::new("user_story_review", TECHNICAL_REVIEWER, "02a_user_story_review.txt")
            .after(&["user_story"])
            .describe(
                "Review the user story for {topic}. Check that it:\n\
                 - Follows agile formatting and structure\n\
                 - Has realistic, feasible acceptance criteria\n\
                 - Covers edge cases (errors, security, opt-outs)\n\
                 - Maps acceptance criteria to functional requirements (FRs)\n\
                 - Has a comprehensive Definition of Done\n\n\
                 Suggest improvements or mark it as approved.",
                "Review report with clear comments and improvement suggestions if needed.",
            ),
        TaskSpec::new("user_story_update", FINAL_REVIEWER, "02b_user_story_updated.txt")
            .after(&["user_story", "user_story_review"])
            .describe(
                "Update the user story for {topic} from the review feedback. Apply every \
                 required change. Keep the structure, the FR mapping and the Definition of Done \
                 intact. If the review found no issues, confirm the document as it stands.",
                "An updated, final markdown user story.",
            ),
        // ── Project design document ──
        TaskSpec::new("pdd", PDD_SPECIALIST, "03_pdd.txt")
            .after(&["user_story_update"])
            .describe(
                "From the updated user story and {topic}, write a **complete, professional \
                 Project Design Document (PDD)** in markdown. It **must contain**:\n\n\
                 1. Executive Summary\n\
                 2. Problem Statement\n\
                 3. Objectives & Success Metrics\n\
                 4. Features Overview\n\
                 5. Technical Architecture Overview (diagram explained in text)\n\n\
                 Use section headers, bullet points and tables where they help (for example \
                 the features overview). Elaborate every section; skip none.",
                "A complete, well-structured markdown PDD with every section and tables where needed.",
            ),
        TaskSpec::new("pdd_review", TECHNICAL_REVIEWER, "03a_pdd_review.txt")
            .after(&["pdd"])
            .describe(
                "Review the PDD for {topic} for:\n\
                 - Presence and completeness of every required section\n\
                 - Correct markdown (headers, lists, tables)\n\
                 - Clarity, accuracy and formal tone\n\
                 - Missing or shallow sections (incomplete tables, vague architecture)\n\
                 - Redundancy or filler\n\n\
                 **Call out incomplete or missing sections explicitly** and suggest precise edits.",
                "A detailed review listing missing content, weak sections, and markdown improvements.",
            ),
        TaskSpec::new("pdd_update", FINAL_REVIEWER, "03b_pdd_updated.txt")
            .after(&["pdd", "pdd_review"])
            .describe(
                "Revise the PDD for {topic} using the review. Make sure that:\n\
                 - **All required sections are present and complete**\n\
                 - The features overview is a **properly formatted table**\n\
                 - Every section has the depth an enterprise audience expects\n\
                 - Markdown formatting is clean and consistent\n\n\
                 The result must be publication-ready.",
                "The final, complete PDD with all improvements applied, in clean markdown.",
            ),
        TaskSpec::new("component_map", COMPONENT_MAPPER, "05_component_mapping.txt")
            .after(&["pdd_update"])
            .describe(
                "Break the system for {topic} down into components and map suitable technologies to each.",
                "Component list with matching technologies.",
            ),
        // ── System design document ──
        TaskSpec::new("sdd", SDD_SPECIALIST, "04_sdd.txt")
            .after(&["pdd_update", "component_map"])
            .describe(
                "From the updated PDD and the component mapping for {topic}, write a **complete \
                 System Design Document (SDD)** in markdown with these sections:\n\n\
                 1. **Technical Architecture**: layers, technologies and responsibilities.\n\
                 2. **Data Flow**: how data moves through the system, step by step.\n\
                 3. **Database Schema**: entities as markdown tables with fields, types and relations.\n\
                 4. **API Specifications**: 3 to 5 key APIs, each with endpoint, description, \
                 request JSON, response format and status codes.\n\n\
                 **All sections are mandatory.** No placeholders; write for a senior engineer.",
                "A complete, technically sound markdown SDD with every required section.",
            ),
        TaskSpec::new("sdd_review", TECHNICAL_REVIEWER, "04a_sdd_review.txt")
            .after(&["sdd"])
            .describe(
                "Review the SDD for {topic}. Check:\n\
                 - **All four sections** (architecture, data flow, database schema, API specs)\n\
                 - Markdown formatting (headers, code blocks, tables)\n\
                 - Technical accuracy and consistency with the PDD\n\
                 - Detail: APIs with example payloads and status codes, at least 3 tables in the schema\n\
                 - Vague or missing content\n\n\
                 Name every weak area and suggest specific improvements.",
                "Detailed SDD review noting missing sections, vague content, or markdown issues.",
            ),
        TaskSpec::new("sdd_update", FINAL_REVIEWER, "04b_sdd_updated.txt")
            .after(&["sdd", "sdd_review"])
            .describe(
                "Update the SDD for {topic} using the review. The final version needs:\n\
                 - All four required sections\n\
                 - **Fully detailed API specs** with endpoint, request/response and status codes\n\
                 - **Clear database schema tables** with field names, types and relationships\n\
                 - Clean headers, bullet points and tables\n\
                 - Technical alignment with the PDD and the requirements",
                "The updated, complete SDD with all review points addressed.",
            ),
        // ── Supporting documents ──
        TaskSpec::new("risk_analysis", RISK_ANALYST, "06_risk_analysis.txt")
            .after(&["sdd_update"])
            .describe(
                "List the key risks of the {topic} system and suggest a mitigation for each.",
                "Risks and mitigation strategies.",
            ),
        TaskSpec::new("flowchart", FLOWCHART_DESIGNER, "07_flowchart.txt")
            .after(&["sdd_update"])
            .describe(
                "Draw a simple system architecture flowchart for {topic} in Mermaid format. \
                 Show only high-level modules, the main user interactions and the essential \
                 data flows. No long edge labels or nested flows; 10 to 15 nodes at most.",
                "A minimal Mermaid flowchart with short node labels.",
            ),
        TaskSpec::new("final_writer", FINAL_WRITER, "08_final_combined_output.txt")
            .after(&["user_story_update", "pdd_update", "sdd_update"])
            .describe(
                "Using the updated user story, PDD and SDD, write one consolidated technical document for {topic}.",
                "A well-formatted combined document with the user story, PDD, and SDD.",
            ),
        TaskSpec::new("evaluation", EVALUATION_AGENT, "evaluation_report.txt")
            .after(&["requirements_update", "user_story_update", "pdd_update", "sdd_update"])
            .describe(
                "Evaluate the documents generated for {topic}: the requirements, the user story, \
                 the PDD and the SDD. For each document give these scores out of 10:\n\
                 - Structural Completeness\n\
                 - Clarity & Tone\n\
                 - Technical Accuracy\n\
                 - Relevance to Topic\n\
                 - Overall Quality\n\n\
                 Follow the scores with two or three lines on strengths, weaknesses and \
                 improvements. Present each document as: name, scores, paragraph.",
                "An evaluation report with per-document scores and improvement suggestions.",
            ),
        // ── Report texts ──
        TaskSpec::new("word_doc_summary", SUMMARY_REPORTER, "docs_summary.txt")
            .after(&["final_writer"])
            .describe(
                "Write a summary report in plain text for {topic}, covering the main purpose, \
                 system overview, technical approach and key components. Leave out deep \
                 implementation detail but keep enough context. Use '# ' and '## ' headings \
                 and '- ' bullet points.",
                "Summarised report content in plain text for a Word summary document.",
            ),
        TaskSpec::new("word_doc_full", FULL_REPORTER, "docs_full.txt")
            .after(&["final_writer"])
            .describe(
                "Write the content of a full report for {topic}. It should cover:\n\
                 - Updated intake (requirements)\n\
                 - Updated user story\n\
                 - Updated PDD\n\
                 - Component mapping\n\
                 - Updated SDD\n\n\
                 Use '# ' and '## ' headings, '- ' bullet points and a consistent layout.",
                "Full report content as plain text for Word conversion.",
            ),
    ]
}

/// The two documents produced after a successful run.
pub fn export_specs() -> Vec<ExportSpec> {
    vec![
        ExportSpec::new("docs_full.txt", "09a_final_full.docx", "Full Technical Report"),
        ExportSpec::new("docs_summary.txt", "09b_summary.docx", "Summarized Report"),
    ]
}

/// Register every catalog agent on `model`.
pub fn register_agents(registry: &mut AgentRegistry, model: &str) -> Result<()> {
    for spec in agent_specs(model) {
        registry.register(spec)?;
    }
    Ok(())
}

/// Build the full task graph against a registry that already holds the catalog agents.
pub fn build_graph(registry: Arc<AgentRegistry>) -> Result<TaskGraph> {
    let mut graph = TaskGraph::new(registry);
    for spec in task_specs() {
        graph.add_task(spec)?;
    }
    Ok(graph)
}

/// Register the agents and build the graph in one step.
pub fn documentation_pipeline(mut registry: AgentRegistry, model: &str) -> Result<TaskGraph> {
    register_agents(&mut registry, model)?;
    build_graph(Arc::new(registry))
}
