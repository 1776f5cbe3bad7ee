use std::fmt::Write;

use super::{BuilderData, ChatData, PlannerData, PromptData, PromptRenderer, ReviewerData};

/// The stock prompt set.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinPrompts;

impl PromptRenderer for BuiltinPrompts {
    fn render(&self, data: &PromptData) -> String {
        match data {
            PromptData::Planner(d) => planner(d),
            PromptData::Builder(d) => builder(d),
            PromptData::Reviewer(d) => reviewer(d),
            PromptData::Chat(d) => chat(d),
        }
    }
}

fn or_none(text: &str) -> &str {
    if text.trim().is_empty() {
        "(none yet)"
    } else {
        text
    }
}

fn augmentation_section(augmentation: &Option<String>) -> String {
    match augmentation {
        Some(text) => format!("\n## PROJECT GUIDANCE\n{text}\n"),
        None => String::new(),
    }
}

fn planner(d: &PlannerData) -> String {
    format!(
        r#"You are the PLANNER. Pick exactly one open requirement record and write an implementation plan for it.

## CODEBASE CONTEXT
{context}

## OPEN RECORDS
```json
{records}
```

## RECENT PROGRESS
{progress}
{augmentation}
## TASK
1. Choose the open record with the lowest priority value unless its notes explain why another must go first.
2. Study the code the record touches.
3. Write the plan to `{plans_dir}/<record-id>-plan.md`: files to change, steps, and how to verify each acceptance criterion.
4. Append a dated entry ({timestamp}) to `.triad/progress.md` describing the choice.

## SIGNALS
Print `WORKING ON: <record-id>` once you have chosen.
When the plan is written, output exactly:
###PLAN_COMPLETE:<record-id>###
If nothing can be planned, output ###PLAN_SKIPPED:<reason>###
If you cannot proceed without help, output ###BLOCKED:<reason>###
"#,
        context = or_none(&d.codebase_context),
        records = d.open_records_json,
        progress = or_none(&d.progress),
        augmentation = augmentation_section(&d.augmentation),
        plans_dir = d.plans_dir,
        timestamp = d.timestamp,
    )
}

fn builder(d: &BuilderData) -> String {
    format!(
        r#"You are the BUILDER. Implement the plan for the active requirement record.

## CODEBASE CONTEXT
{context}

## ACTIVE RECORD
```json
{record}
```

## PLAN ({plan_path})
{plan}

## RECENT PROGRESS
{progress}
{augmentation}
## CRITICAL RULES
1. Follow the plan; record deviations in the record's notes.
2. Run the project's tests and checks before claiming completion.
3. Append a dated entry ({timestamp}) to `.triad/progress.md` describing what changed.
4. Do not change the status of any record yourself.

## SIGNALS
Print `WORKING ON: {id}` before you start.
When every acceptance criterion is met and verified, output exactly:
###PRD_COMPLETE###
If you must stop early, save your progress in the notes and output ###BAILOUT:<reason>###
If you cannot proceed without help, output ###BLOCKED:<reason>###
"#,
        context = or_none(&d.codebase_context),
        record = d.record_json,
        plan_path = d.plan_path.as_deref().unwrap_or("no plan file"),
        plan = or_none(&d.plan_content),
        progress = or_none(&d.progress),
        augmentation = augmentation_section(&d.augmentation),
        timestamp = d.timestamp,
        id = d.record_id,
    )
}

fn reviewer(d: &ReviewerData) -> String {
    let mut plans = String::new();
    for (id, content) in &d.active_plans {
        let _ = write!(plans, "\n### {id}\n{content}\n");
    }
    let mut guidance = String::new();
    for (phase, content) in &d.guidance {
        let _ = write!(
            guidance,
            "\n### {}/{phase}.md\n{}\n",
            d.prompts_dir,
            or_none(content)
        );
    }

    format!(
        r#"You are the REVIEWER (iteration {iteration}). Check the builder's claims, keep plans current, and sharpen the guidance the other phases receive.

## ALL RECORDS
```json
{records}
```

## ACTIVE PLANS
{plans}

## RECENT PROGRESS
{progress}

## CURRENT PHASE GUIDANCE
{guidance}
{augmentation}
## TASK
1. For every pending record, verify each acceptance criterion against the code and tests.
2. For an active record whose builder bailed out, rewrite its plan so the next attempt can finish.
3. Flag records that keep failing across iterations.
4. Change at least one thing: a verdict, a plan, a note, or a guidance file.

## SIGNALS (one per line, repeat as needed)
###VERIFIED:<record-id>###
###REJECTED:<record-id>:<reason>###
###PLAN_UPDATED:<record-id>###
###LOOP_RISK:<record-id>###
###PROMPT_UPDATED:<planner|builder|reviewer>###
Finish with ###ANALYSIS_COMPLETE###
"#,
        iteration = d.iteration,
        records = d.records_json,
        plans = or_none(&plans),
        progress = or_none(&d.progress),
        guidance = guidance,
        augmentation = augmentation_section(&d.augmentation),
    )
}

fn chat(d: &ChatData) -> String {
    let c = &d.counts;
    format!(
        r#"You are helping the user manage a requirement record queue in `.triad/prd.json`.

Current state: {total} records ({open} open, {active} active, {pending} pending, {complete} complete).
Progress log: {lines} lines in `.triad/progress.md`.
Codebase notes in `.triad/prompt.md`: {context}.
{augmentation}
Help the user add, refine or reprioritize records. New records start with "passes": false.
Never mark a record complete; only the reviewer does that.
"#,
        total = c.total(),
        open = c.open,
        active = c.active,
        pending = c.pending,
        complete = c.complete,
        lines = d.progress_lines,
        context = if d.has_codebase_context { "present" } else { "empty" },
        augmentation = augmentation_section(&d.augmentation),
    )
}
