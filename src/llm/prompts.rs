//! Prompt templates. User-facing wording is pt-BR; JSON keys are the ones
//! `Action` deserializes.

use super::actions::Domain;

pub const SYSTEM_PROMPT: &str = r#"Você é o interpretador de um assistente financeiro pessoal no WhatsApp.
Responda somente com JSON válido, sem explicações e sem comentários."#;

pub const REPLY_SYSTEM_PROMPT: &str = r#"Você é um assistente financeiro pessoal no WhatsApp.
Responda em português do Brasil, de forma curta e amigável.
Quando não entender o pedido, sugira exemplos: registrar despesa ("gastei 50 no mercado"),
registrar receita ("recebi 3000 de salário"), criar lembrete ("me lembra de pagar a luz dia 10"),
ver saldo, ver despesas do mês."#;

pub fn classifier(message: &str) -> String {
    format!(
        r#"Classifique a mensagem do usuário em UM domínio principal.

Domínios possíveis:
- finance
- reminder
- query
- other

Regras:
- "finance" quando houver entrada ou saída de dinheiro, valores numéricos ou verbos como
  receber, ganhar, gastar, pagar, salário.
- Considere "finance" também para padrões recorrentes: "todo dia X", "dia X útil",
  "sempre no dia", "recebo X dia Y".
- "reminder" apenas para eventos pontuais (conta, compromisso, aviso único).
- "query" para consultas: saldo, extrato, perfil, gastos por categoria.

Responda APENAS em JSON válido:
{{ "domain": "..." }}

Mensagem:
"{message}""#
    )
}

fn finance(message: &str) -> String {
    format!(
        r#"Você é um interpretador semântico de mensagens financeiras.

Regras gerais:
- NÃO converse e NÃO explique.
- NÃO invente valores inexistentes. Se faltar algo, use null.
- A resposta DEVE ser um ARRAY; cada item é UMA ação.
- Sem intenção clara: [ {{ "action": "unknown" }} ]

Ações:

{{ "action": "register_expense", "amount": number | null, "description": string | null,
  "category": string | null, "schedule": boolean, "scheduled_date": string | null }}

{{ "action": "register_income", "amount": number | null, "description": string | null,
  "category": string | null, "schedule": boolean, "scheduled_date": string | null }}

{{ "action": "create_recurrence", "kind": "income" | "expense" | null, "amount": number | null,
  "description": string | null, "frequency": "daily" | "weekly" | "monthly" | "annual" | null,
  "monthly_rule": "day_of_month" | "business_day" | null, "day_of_month": number | null,
  "business_day": number | null }}

{{ "action": "create_category", "name": string | null, "kind": "income" | "expense" | null }}

{{ "action": "edit_transaction", "id": string | null, "field": "amount" | "description" | "date" | null,
  "new_value": string | number | null }}

{{ "action": "delete_transaction", "id": string | null }}

Regras semânticas:
- Entrada de dinheiro: kind = "income". Saída: kind = "expense".
- Repetição explícita ou implícita ("todo mês", "todo dia X", "sempre no dia", "dia X útil")
  gera create_recurrence.
- "dia X útil": frequency = "monthly", monthly_rule = "business_day", business_day = X.
- Padrão fixo de dia sem frequência: assuma "monthly".
- Datas futuras ("amanhã", "dia 25", "25/02/2026"): schedule = true e scheduled_date com o texto da data.
- Categorias genéricas, minúsculas, sem acentos.
- Retorne todas as ações encontradas.

Mensagem do usuário:
"{message}"

Retorne APENAS o JSON."#
    )
}

fn reminder(message: &str) -> String {
    format!(
        r#"Você é um interpretador semântico de lembretes.

Objetivo: extrair mensagem, data, valor e regra de dia útil. NUNCA invente nem calcule datas.

Formato: sempre um ARRAY JSON.
Sem intenção clara: [ {{ "action": "unknown" }} ]

{{ "action": "create_reminder", "message": string | null, "date": string | null,
  "amount": number | null, "ask_amount": boolean,
  "business_day": {{ "n": number, "next_month": boolean }} | null }}

Regras:
- Lembrete é um evento único no futuro.
- Data pouco clara: date = null.
- "5º dia útil", "décimo dia útil": NÃO calcule; preencha business_day.
- Data explícita (ex: 20/01/2026): use date e business_day = null.
- "ask_amount" = true quando o usuário disser que vai informar o valor depois.

Exemplos:
"lembrete pagar condomínio no 5º dia útil" →
[ {{ "action": "create_reminder", "message": "pagar condomínio", "date": null, "amount": null,
  "ask_amount": false, "business_day": {{ "n": 5, "next_month": false }} }} ]
"lembrete pagar aluguel dia 10/02/2026" →
[ {{ "action": "create_reminder", "message": "pagar aluguel", "date": "10/02/2026", "amount": null,
  "ask_amount": false, "business_day": null }} ]

Mensagem do usuário:
"{message}"

Retorne APENAS o JSON."#
    )
}

fn query(message: &str) -> String {
    format!(
        r#"Você interpreta pedidos de consulta financeira. Identifique apenas UMA ação.

{{ "action": "view_balance" }}
{{ "action": "view_expenses_by_category" }}
{{ "action": "view_category_expenses", "category": string | null }}
{{ "action": "view_income_details" }}
{{ "action": "view_expense_details" }}
{{ "action": "view_profile" }}
{{ "action": "help" }}

Sem intenção clara: {{ "action": "unknown" }}

Mensagem do usuário:
"{message}"

Retorne APENAS o JSON."#
    )
}

fn full_fallback(message: &str) -> String {
    format!(
        r#"Identifique a intenção do usuário e extraia valores, categorias e datas.
Seja tolerante com erros de digitação. Retorne um ARRAY JSON de ações.
Sem intenção clara: [ {{ "action": "unknown" }} ]

Ações suportadas:
- register_expense / register_income: amount, description, category, schedule, scheduled_date
- create_category: name, kind ("income" | "expense")
- create_reminder: message, date, amount, ask_amount
- create_recurrence: kind, amount, description, frequency, monthly_rule, day_of_month, business_day
- edit_transaction: id, field ("amount" | "description" | "date"), new_value
- delete_transaction: id
- view_balance, view_profile, view_expenses_by_category, view_income_details, view_expense_details
- view_category_expenses: category
- register_user: name, tax_id
- help

Regras:
- Valores com erros: "50", "50,90", "R$50", "50reais", "ganhei5mil".
- Frases incompletas: "gastei 50" → register_expense; "ganhei 200" → register_income.
- Nunca invente valores: use null.

Mensagem do usuário:
"{message}"

Retorne APENAS o JSON."#
    )
}

/// Extraction prompt scoped to `domain`.
pub fn extraction(domain: Domain, message: &str) -> String {
    match domain {
        Domain::Finance => finance(message),
        Domain::Reminder => reminder(message),
        Domain::Query => query(message),
        Domain::Other => full_fallback(message),
    }
}

pub fn reply(message: &str) -> String {
    format!(
        "O usuário enviou: \"{}\"\nA intenção não ficou clara. Responda de forma breve e sugira o que ele pode fazer.",
        message
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompts_embed_message_and_keys() {
        let prompt = extraction(Domain::Finance, "gastei 50 no mercado");
        assert!(prompt.contains("\"gastei 50 no mercado\""));
        assert!(prompt.contains("\"action\": \"register_expense\""));

        assert!(extraction(Domain::Reminder, "x").contains("business_day"));
        assert!(extraction(Domain::Query, "x").contains("view_balance"));
        assert!(extraction(Domain::Other, "x").contains("register_user"));
        assert!(classifier("oi").contains("{ \"domain\": \"...\" }"));
    }
}
