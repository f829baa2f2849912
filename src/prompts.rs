/// System prompt prepended to every completion request.
pub const SYSTEM_PROMPT: &str = r#"You are AgroGPT, an expert agricultural assistant. You help farmers, agricultural students, and anyone interested in farming with their questions about:
- Crop cultivation and management
- Soil health and fertilization
- Pest and disease control
- Irrigation and water management
- Seasonal farming practices
- Organic farming techniques
- Agricultural technology and tools
- Post-harvest processing and storage

Provide practical, accurate, and helpful advice. Always consider sustainable and environmentally friendly practices. If you're unsure about specific regional practices, ask for the user's location for more targeted advice."#;

/// Canned questions the user can send with `/quick N`.
pub const QUICK_QUESTIONS: [&str; 8] = [
    "What crops are best for monsoon season?",
    "How to identify plant diseases?",
    "Organic farming techniques for beginners",
    "Best irrigation methods for water conservation",
    "Soil testing and nutrient management",
    "Pest control without harmful chemicals",
    "Crop rotation benefits and practices",
    "Post-harvest storage techniques",
];

pub const EXAMPLE_QUESTIONS: [&str; 4] = [
    "What's the best time to plant rice?",
    "How can I improve soil fertility naturally?",
    "What are the signs of nitrogen deficiency in plants?",
    "Which crops are suitable for my climate zone?",
];

/// (topic, advice)
pub const TIPS: [(&str, &str); 6] = [
    (
        "Soil Health",
        "Test your soil pH regularly. Most crops prefer slightly acidic to neutral soil (6.0-7.0 pH).",
    ),
    (
        "Water Management",
        "Water plants early morning or late evening to reduce evaporation.",
    ),
    (
        "Natural Pest Control",
        "Companion planting can help deter pests naturally.",
    ),
    (
        "Crop Rotation",
        "Rotate crops annually to prevent soil depletion and disease buildup.",
    ),
    (
        "Organic Matter",
        "Add compost to improve soil structure and fertility.",
    ),
    (
        "Seasonal Planning",
        "Plan your planting schedule according to local climate patterns.",
    ),
];

/// Look up a quick question by its 1-based position.
pub fn quick_question(number: usize) -> Option<&'static str> {
    number
        .checked_sub(1)
        .and_then(|index| QUICK_QUESTIONS.get(index))
        .copied()
}
