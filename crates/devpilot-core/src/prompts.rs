//! Prompt templates for code actions.

use chrono::{DateTime, Utc};

use crate::functionality::Functionality;
use crate::l10n::Locale;

const LANGUAGE_SUFFIX: &str = "Please response in {{LOCALE}}";

const SYSTEM_PROMPT: &str = "You are a coding expert.

You must obey ALL of the following rules:
- quote variable name with single backtick such as `name`.
- quote code block with triple backticks such as ```...```.";

const EXPLAIN_CODE: &str = "{{CODE}}

Giving the code above, please explain it in detail, line by line.";

const FIX_CODE: &str = "{{CODE}}

Giving the code above, please help to fix it:
- Fix any typos or grammar issues.
- Use better names as replacement to magic numbers or arbitrary acronyms.
- Simplify the code so that it's more straight forward and easy to understand.
- Optimize it for performance reasons.
- Refactor it using best practice in software engineering.

Must only provide the code to be fixed and explain why it should be fixed.";

const COMMENT_CODE: &str = "{{CODE}}

Giving the code above, please generate code comments, return code with comments";

const GENERATE_TEST: &str = "{{CODE}}

Giving the code above, please help to generate unit test cases for it. If the code is untestable, give refactor suggestions instead.";

const CHECK_PERFORMANCE: &str = "{{CODE}}

Giving the code above, please fix any performance issues.
Remember you are very familiar with performance optimization.";

const REVIEW_CODE: &str = "{{CODE}}

Giving the code above, please review the code line by line
- Think carefully, you should be extremely careful.
- Find out if any bugs exists.
- Reveal any bad smell in the code.
- Give optimization or best practice suggestion.";

const COMMENT_METHOD: &str = "{{CODE}}

Giving the method above, please write a documentation comment for it, return only the comment.";

const GENERATE_COMMIT: &str = "{{CODE}}

Giving the diff above, please write a concise commit message: a summary line, a blank line, then the details.";

fn template(functionality: Functionality) -> &'static str {
    match functionality {
        Functionality::ExplainCode => EXPLAIN_CODE,
        Functionality::FixCode => FIX_CODE,
        Functionality::CommentCode => COMMENT_CODE,
        Functionality::GenerateTest => GENERATE_TEST,
        Functionality::CheckPerformance => CHECK_PERFORMANCE,
        Functionality::ReviewCode => REVIEW_CODE,
        Functionality::CommentMethod => COMMENT_METHOD,
        Functionality::GenerateCommit => GENERATE_COMMIT,
    }
}

/// System prompt with locale and time filled in.
pub fn system_prompt(locale: Locale, now: DateTime<Utc>) -> String {
    SYSTEM_PROMPT
        .replace("{{LOCALE}}", locale.answer_language())
        .replace("{{TIME}}", &now.format("%Y-%m-%d %H:%M:%S").to_string())
}

/// Instruction asking the model to answer in `locale`.
pub fn language_suffix(locale: Locale) -> String {
    LANGUAGE_SUFFIX.replace("{{LOCALE}}", locale.answer_language())
}

/// Full user prompt for a code action on `code`.
pub fn functionality_prompt(
    functionality: Functionality,
    language_id: &str,
    code: &str,
    locale: Locale,
) -> String {
    let body = template(functionality).replace("{{CODE}}", &wrap_in_codeblock(language_id, code));
    format!("{}\n\n{}", body, language_suffix(locale))
}

/// Fence `code` as a markdown code block tagged with `lang`.
pub fn wrap_in_codeblock(lang: &str, code: &str) -> String {
    format!("```{}\n{}\n```", lang, code)
}

/// Prefix a chat message with the selected code.
pub fn message_with_codeblock(message: &str, code: &str, lang: &str) -> String {
    format!("{}\n\n{}", wrap_in_codeblock(lang, code), message)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrap_in_codeblock() {
        assert_eq!(wrap_in_codeblock("rust", "foo()"), "```rust\nfoo()\n```");
    }

    #[test]
    fn test_message_with_codeblock() {
        assert_eq!(
            message_with_codeblock("what does it do?", "foo()", "js"),
            "```js\nfoo()\n```\n\nwhat does it do?"
        );
    }

    #[test]
    fn test_functionality_prompt() {
        let prompt =
            functionality_prompt(Functionality::ExplainCode, "rust", "foo()", Locale::Chinese);
        assert!(prompt.starts_with("```rust\nfoo()\n```\n\nGiving the code above"));
        assert!(prompt.ends_with("Please response in Chinese"));
        assert!(!prompt.contains("{{"));
    }

    #[test]
    fn test_every_template_has_code_slot() {
        for functionality in Functionality::all() {
            assert!(template(*functionality).contains("{{CODE}}"));
        }
    }

    #[test]
    fn test_system_prompt() {
        let prompt = system_prompt(Locale::English, Utc::now());
        assert!(prompt.starts_with("You are a coding expert."));
        assert!(!prompt.contains("{{"));
    }
}
