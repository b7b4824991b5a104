use crate::ai::completion::CompletionOptions;

pub const PARSE_OPTIONS: CompletionOptions = CompletionOptions {
    temperature: 0.3,
    max_tokens: 1000,
};

pub const ESTIMATE_OPTIONS: CompletionOptions = CompletionOptions {
    temperature: 0.2,
    max_tokens: 400,
};

pub const PARSE_SYSTEM_PROMPT: &str = r#"You turn a free-text description of a meal into a list of foods with weights.

Rules:
- Keep the cooking method in the food name when one is given ("baked chicken breast", "boiled potatoes", "fried egg"). Raw and cooked forms have different nutrition.
- Split a dish into separate foods only when the user lists them separately ("rice and chicken"). Keep a single named dish as one food ("borscht", "caesar salad", "cheeseburger").
- Condiments, sauces and drinks that are mentioned are separate foods.
- quantity is the weight in grams. Convert pieces, cups, spoons and portions to a typical weight. Never return 0 unless the user said so.
- name is in the language the user wrote in.
- searchTerms lists 1 to 4 alternative names for looking the food up in a product catalog, most specific first. Include an English name and the name in the user's language. Do not repeat name in searchTerms.
- confidence is a number from 0 to 1 describing how sure you are about the foods and weights.
- If the text does not describe food, return an empty items array.

Respond with JSON only, exactly in this shape:
{"confidence": 0.85, "items": [{"name": "boiled buckwheat", "quantity": 200, "searchTerms": ["buckwheat boiled", "гречка варёная"]}]}"#;

pub const ESTIMATE_SYSTEM_PROMPT: &str = r#"You estimate nutrition values per 100 grams of a food.

Rules:
- When the name includes a cooking method, give values for the prepared form, not the raw ingredient. Baked chicken and raw chicken differ.
- For a composite dish use a typical home recipe.
- All values are per 100 g of the edible, ready-to-eat food.
- kcalPer100g is required. Use null for a macro you cannot estimate.

Respond with JSON only, exactly in this shape:
{"kcalPer100g": 165, "proteinPer100g": 31.0, "fatPer100g": 3.6, "carbsPer100g": 0.0, "fiberPer100g": 0.0, "sugarPer100g": 0.0}"#;

pub fn parse_user_prompt(text: &str) -> String {
    format!("Meal description:\n{}", text.trim())
}

pub fn estimate_user_prompt(food_name: &str) -> String {
    format!("Food: {}", food_name.trim())
}
