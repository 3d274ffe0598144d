//! Heuristic factor tagging of market questions.
//!
//! A pure function over a fixed keyword table. Single-word keywords match
//! whole tokens ("eth" does not match "method"); multi-word keywords match
//! the normalised question as a phrase.

/// (keywords, factor tag)
const FACTOR_RULES: &[(&[&str], &str)] = &[
    (&["trump", "maga"], "Politics.Trump"),
    (&["biden", "harris", "democrat", "democrats"], "Politics.Democrats"),
    (&["republican", "republicans", "gop"], "Politics.Republicans"),
    (&["election", "senate", "congress", "president", "presidential"], "Politics.US"),
    (&["fed", "fomc", "powell", "interest rate", "rate cut", "rate hike"], "Macro.Rates"),
    (&["inflation", "cpi", "pce"], "Macro.Inflation"),
    (&["recession", "gdp", "unemployment", "jobs report"], "Macro.Growth"),
    (&["bitcoin", "btc"], "Crypto.Bitcoin"),
    (&["ethereum", "eth", "ether"], "Crypto.Ethereum"),
    (&["crypto", "solana", "stablecoin"], "Crypto.Broad"),
    (&["ukraine", "russia", "putin", "zelensky"], "Geopolitics.RussiaUkraine"),
    (&["israel", "gaza", "iran", "hezbollah"], "Geopolitics.MiddleEast"),
    (&["china", "taiwan", "beijing"], "Geopolitics.China"),
    (&["openai", "gpt", "agi", "artificial intelligence"], "Tech.AI"),
    (&["nfl", "nba", "super bowl", "world cup", "premier league"], "Sports"),
];

/// Factor tags for a market question, sorted and deduplicated.
pub fn classify(question: &str) -> Vec<String> {
    let lowered = question.to_lowercase();
    let tokens: Vec<&str> = lowered
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .collect();
    let normalised = format!(" {} ", tokens.join(" "));

    let mut tags: Vec<String> = FACTOR_RULES
        .iter()
        .filter(|(keywords, _)| {
            keywords.iter().any(|kw| {
                if kw.contains(' ') {
                    normalised.contains(&format!(" {} ", kw))
                } else {
                    tokens.contains(kw)
                }
            })
        })
        .map(|(_, tag)| tag.to_string())
        .collect();

    tags.sort();
    tags.dedup();
    tags
}

/// Every tag the rule table can produce.
pub fn known_factors() -> Vec<&'static str> {
    let mut tags: Vec<&'static str> = FACTOR_RULES.iter().map(|(_, tag)| *tag).collect();
    tags.sort();
    tags.dedup();
    tags
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keyword_tags() {
        assert_eq!(classify("Will Trump win the 2028 election?"), vec!["Politics.Trump", "Politics.US"]);
        assert_eq!(classify("Fed rate cut in December?"), vec!["Macro.Rates"]);
        assert!(classify("Will it rain in Paris tomorrow?").is_empty());
    }

    #[test]
    fn test_tokens_not_substrings() {
        // "method" must not match "eth", "fedex" must not match "fed"
        assert!(classify("Will FedEx change its shipping method?").is_empty());
        assert_eq!(classify("ETH above $5k?"), vec!["Crypto.Ethereum"]);
    }

    #[test]
    fn test_phrase_keywords() {
        assert_eq!(classify("Next INTEREST-RATE decision: hike?"), vec!["Macro.Rates"]);
        assert!(known_factors().contains(&"Sports"));
    }
}
